//! Alert sinks: structured log, JSON lines and terminal bell.

use std::io::{self, Write};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::warn;
use watchpost_core::{AlertEvent, AlertSink};

/// Logs every alert as a warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl LogSink {
    /// Renders an alert as `[module] ALERT: details (confidence)`.
    #[must_use]
    pub fn format(event: &AlertEvent) -> String {
        let details = if event.details.is_empty() {
            event.status.as_str()
        } else {
            event.details.as_str()
        };
        format!(
            "[{}] ALERT: {} ({:.2})",
            event.module_id, details, event.confidence
        )
    }
}

impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&self, event: &AlertEvent) -> Result<()> {
        warn!(
            target: "watchpost::alert",
            at_secs = event.timestamp.as_secs_f64(),
            "{}",
            Self::format(event)
        );
        Ok(())
    }
}

/// Writes each alert as one line of JSON.
pub struct JsonLinesSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    /// Creates a sink writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Creates a sink writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl AlertSink for JsonLinesSink {
    fn name(&self) -> &str {
        "json"
    }

    #[allow(clippy::significant_drop_tightening)]
    fn notify(&self, event: &AlertEvent) -> Result<()> {
        let json = serde_json::to_string(event).context("Failed to serialize alert")?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writeln!(writer, "{json}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Rings the terminal bell on every alert.
pub struct BellSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl BellSink {
    /// Creates a bell on stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()))
    }

    /// Creates a bell on the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl AlertSink for BellSink {
    fn name(&self) -> &str {
        "bell"
    }

    #[allow(clippy::significant_drop_tightening)]
    fn notify(&self, _event: &AlertEvent) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writer.write_all(b"\x07").context("Failed to ring bell")?;
        writer.flush()?;
        Ok(())
    }
}

//! JSON output adapter for per-frame reports and whole-run documents.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use serde::Serialize;
use watchpost_core::{AlertEvent, FrameReport, PipelineEvent, PipelineObserver, RunSummary};

/// What the report writer prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// One `FrameReport` per line as frames complete.
    FrameLines,
    /// A single document at the end of the run.
    Document {
        /// Include every frame report, not only the alerts.
        frames: bool,
        /// Pretty-print the document.
        pretty: bool,
    },
}

/// The single JSON document printed in `json` format.
#[derive(Serialize)]
struct RunDocument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<&'a [FrameReport]>,
    alerts: &'a [AlertEvent],
    summary: &'a RunSummary,
}

#[derive(Default)]
struct Collected {
    frames: Vec<FrameReport>,
    alerts: Vec<AlertEvent>,
    summary: Option<RunSummary>,
    error: Option<String>,
}

/// Pipeline observer that renders reports as JSON.
pub struct ReportWriter {
    writer: Mutex<Box<dyn Write + Send>>,
    mode: ReportMode,
    collected: Mutex<Collected>,
}

impl ReportWriter {
    /// Creates a report writer on stdout.
    #[must_use]
    pub fn stdout(mode: ReportMode) -> Self {
        Self::new(Box::new(io::stdout()), mode)
    }

    /// Creates a report writer on the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>, mode: ReportMode) -> Self {
        Self {
            writer: Mutex::new(writer),
            mode,
            collected: Mutex::new(Collected::default()),
        }
    }

    /// Writes one line of JSON.
    #[allow(clippy::significant_drop_tightening)]
    fn write_line(&self, json: &str) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writeln!(writer, "{json}")?;
        writer.flush()?;
        Ok(())
    }

    fn record_error(&self, error: &anyhow::Error) {
        let mut collected = self.collected.lock().unwrap_or_else(PoisonError::into_inner);
        if collected.error.is_none() {
            collected.error = Some(format!("{error:#}"));
        }
    }

    /// Prints the end-of-run document, if any, and reports the first write
    /// failure seen during the run.
    ///
    /// # Errors
    ///
    /// Returns an error if any output could not be written.
    pub fn finish(&self) -> Result<()> {
        let collected = std::mem::take(
            &mut *self.collected.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if let Some(error) = collected.error {
            anyhow::bail!("Failed to write results: {error}");
        }

        if let ReportMode::Document { frames, pretty } = self.mode {
            let summary = collected.summary.unwrap_or_default();
            let document = RunDocument {
                frames: frames.then_some(collected.frames.as_slice()),
                alerts: &collected.alerts,
                summary: &summary,
            };
            let json = if pretty {
                serde_json::to_string_pretty(&document)?
            } else {
                serde_json::to_string(&document)?
            };
            self.write_line(&json)?;
        }
        Ok(())
    }
}

impl PipelineObserver for ReportWriter {
    fn on_event(&self, event: PipelineEvent) {
        match (event, self.mode) {
            (PipelineEvent::FrameProcessed { report }, ReportMode::FrameLines) => {
                let written = serde_json::to_string(&report)
                    .map_err(anyhow::Error::from)
                    .and_then(|json| self.write_line(&json));
                if let Err(e) = written {
                    self.record_error(&e);
                }
            }
            (PipelineEvent::FrameProcessed { report }, ReportMode::Document { frames, .. }) => {
                let mut collected = self.collected.lock().unwrap_or_else(PoisonError::into_inner);
                collected.alerts.extend(report.alerts.iter().cloned());
                if frames {
                    collected.frames.push(report);
                }
            }
            (PipelineEvent::Finished { summary }, _) => {
                self.collected
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .summary = Some(summary);
            }
            _ => {}
        }
    }
}

//! Alert fan-out to notification sinks.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, warn};

use super::panic_message;
use crate::domain::AlertEvent;
use crate::ports::AlertSink;

/// A sink that failed to take delivery of an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkFailure {
    /// Sink name.
    pub sink: String,
    /// Module whose alert was not delivered.
    pub module: String,
    /// Why delivery failed.
    pub reason: String,
}

/// Outcome of dispatching one alert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of sinks that accepted the alert.
    pub delivered: usize,
    /// Sinks that failed.
    pub failures: Vec<SinkFailure>,
}

/// Delivers alerts to every registered sink, in order.
#[derive(Default)]
pub struct AlertDispatcher {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl AlertDispatcher {
    /// Creates a dispatcher over the given sinks, notified in order.
    #[must_use]
    pub fn new(sinks: Vec<Box<dyn AlertSink>>) -> Self {
        Self { sinks }
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Sends `event` to every sink exactly once.
    ///
    /// A sink that errors or panics is recorded in the report and skipped;
    /// the remaining sinks are still notified.
    pub fn dispatch(&self, event: &AlertEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for sink in &self.sinks {
            let outcome = catch_unwind(AssertUnwindSafe(|| sink.notify(event)));
            let reason = match outcome {
                Ok(Ok(())) => {
                    debug!(sink = sink.name(), module = %event.module_id, "alert delivered");
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(e)) => format!("{e:#}"),
                Err(payload) => format!("sink panicked: {}", panic_message(payload.as_ref())),
            };

            warn!(sink = sink.name(), module = %event.module_id, %reason, "alert sink failed");
            report.failures.push(SinkFailure {
                sink: sink.name().to_string(),
                module: event.module_id.clone(),
                reason,
            });
        }

        report
    }
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

//! Alert sink port.

use crate::domain::AlertEvent;

/// A notification target for fired alerts (log, audio cue, overlay, ...).
pub trait AlertSink: Send + Sync {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Delivers one alert.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails. Other sinks still receive the alert.
    fn notify(&self, event: &AlertEvent) -> anyhow::Result<()>;
}

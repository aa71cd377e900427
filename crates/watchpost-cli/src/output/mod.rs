//! Output formatting for CLI.

mod json;
mod progress;

use watchpost_core::{PipelineEvent, PipelineObserver};

pub use json::{ReportMode, ReportWriter};
pub use progress::ProgressBar;

/// Forwards every event to several observers, in order.
pub struct Fanout<'a>(pub Vec<&'a dyn PipelineObserver>);

impl PipelineObserver for Fanout<'_> {
    fn on_event(&self, event: PipelineEvent) {
        for observer in &self.0 {
            observer.on_event(event.clone());
        }
    }
}

//! Alert state machine, orchestrator and dispatcher.

mod alert_state;
mod dispatcher;
mod invoke;
mod orchestrator;

pub use alert_state::AlertState;
pub use dispatcher::{AlertDispatcher, DispatchReport, SinkFailure};
pub use invoke::InvocationMode;
pub use orchestrator::{FrameReport, Orchestrator, OrchestratorBuilder, RunSummary, StopHandle};

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

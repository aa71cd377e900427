//! Pipeline observer port for progress and result rendering.

use crate::engine::{FrameReport, RunSummary};

/// Events emitted while the orchestrator pumps frames.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// The run started.
    Started {
        /// Registered module ids, in registration order.
        modules: Vec<String>,
        /// Total frames, if the source knows.
        total: Option<usize>,
    },
    /// A frame went through every module.
    FrameProcessed {
        /// Results and alerts for the frame.
        report: FrameReport,
    },
    /// A frame could not be loaded and was skipped.
    FrameSkipped {
        /// Position in the source.
        index: usize,
        /// Reason for skipping.
        reason: String,
    },
    /// The run ended.
    Finished {
        /// Totals for the run.
        summary: RunSummary,
    },
}

/// Port for receiving pipeline events.
pub trait PipelineObserver: Send + Sync {
    /// Called when a pipeline event occurs.
    fn on_event(&self, event: PipelineEvent);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_event(&self, _event: PipelineEvent) {}
}

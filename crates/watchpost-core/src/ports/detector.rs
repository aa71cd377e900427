//! Detector port.

use crate::domain::{ClassificationResult, Frame, Timestamp};

/// A pluggable per-frame classifier.
///
/// Implementations own whatever state they need (previous frames, motion
/// history, model handles). That state is never shared between instances and
/// the orchestrator never looks inside it.
pub trait Detector: Send {
    /// Stable identifier for this detector instance.
    fn id(&self) -> &str;

    /// Classifies one frame.
    ///
    /// Called exactly once per frame, in stream order.
    ///
    /// # Errors
    ///
    /// Returns an error if classification fails. The orchestrator records the
    /// failure as an `error` result for this module only.
    fn classify(&mut self, frame: &Frame, timestamp: &Timestamp) -> anyhow::Result<ClassificationResult>;

    /// Forgets state built from earlier frames, such as a motion reference.
    ///
    /// Called when the frames this detector sees stop being contiguous, for
    /// example when a gate skips it for a while.
    fn reset(&mut self) {}
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn classify(&mut self, frame: &Frame, timestamp: &Timestamp) -> anyhow::Result<ClassificationResult> {
        (**self).classify(frame, timestamp)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

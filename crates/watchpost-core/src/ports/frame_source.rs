//! Frame source port.

use crate::domain::{Frame, Timestamp};

/// A frame together with its capture time.
#[derive(Debug, Clone)]
pub struct TimedFrame {
    /// The frame.
    pub frame: Frame,
    /// When it was captured.
    pub timestamp: Timestamp,
}

/// Port for pulling frames from a video source.
pub trait FrameSource: Send {
    /// Returns an iterator over the frames of this source, in stream order.
    ///
    /// The iterator ending is the normal end-of-stream signal.
    ///
    /// # Errors
    ///
    /// Individual items may be errors if a frame fails to load; the pipeline
    /// skips them and keeps going.
    fn frames(&mut self) -> Box<dyn Iterator<Item = anyhow::Result<TimedFrame>> + Send + '_>;

    /// Returns the total number of frames, if known.
    fn count_hint(&self) -> Option<usize>;
}

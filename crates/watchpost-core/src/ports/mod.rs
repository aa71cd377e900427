//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the alerting core and the
//! detectors, frame sources and sinks plugged into it.

mod alert_sink;
mod detector;
mod frame_source;
mod observer;

pub use alert_sink::AlertSink;
pub use detector::Detector;
pub use frame_source::{FrameSource, TimedFrame};
pub use observer::{NoopObserver, PipelineEvent, PipelineObserver};

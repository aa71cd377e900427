//! Watchpost Adapters - Concrete frame sources, sinks and detectors.
//!
//! This crate provides:
//! - A directory-of-images frame source
//! - Alert sinks (log, JSON lines, terminal bell)
//! - Motion-based altercation and after-hours anomaly detectors

pub mod detectors;
pub mod fs;
pub mod sinks;

pub use detectors::{
    ActiveHours, AltercationConfig, AltercationDetector, AnomalyConfig, AnomalyDetector, Gated,
};
pub use fs::DirFrameSource;
pub use sinks::{BellSink, JsonLinesSink, LogSink};

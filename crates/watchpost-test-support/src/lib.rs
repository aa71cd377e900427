//! Test support utilities for watchpost.
//!
//! Provides port mocks, scripted detectors and synthetic frame builders for
//! testing the alerting pipeline.
//!
//! # Example
//!
//! ```
//! use watchpost_test_support::{MockFrameSource, ScriptedDetector, SyntheticFrameBuilder};
//!
//! let images = SyntheticFrameBuilder::moving_sequence(4, 32, 32);
//! let source = MockFrameSource::new(SyntheticFrameBuilder::timed(images, 10.0));
//! let detector = ScriptedDetector::new("door", ["normal", "anomaly"]);
//! ```

mod builders;
mod mocks;

pub use builders::SyntheticFrameBuilder;
pub use mocks::{
    FailingDetector, FailingSink, MockFrameSource, MockObserver, PanickingDetector,
    RecordingSink, ScriptedDetector, SlowDetector,
};

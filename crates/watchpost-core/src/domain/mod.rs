//! Core domain types for debounced frame alerting.

mod alert;
mod classification;
mod frame;

pub use alert::{AlertEvent, DetectorConfig};
pub use classification::{ClassificationResult, ERROR_STATUS};
pub use frame::{Frame, Timestamp};

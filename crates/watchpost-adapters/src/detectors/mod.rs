//! Motion-based detectors.

mod active_hours;
mod altercation;
mod anomaly;
pub mod motion;

pub use active_hours::{ActiveHours, FixedHour, Gated, HourClock, LocalClock, INACTIVE_STATUS};
pub use altercation::{
    AltercationConfig, AltercationDetector, AGITATED, ALTERCATION_ID, NO_VIOLENCE, VIOLENCE_DETECTED,
};
pub use anomaly::{AnomalyConfig, AnomalyDetector, ANOMALY, ANOMALY_ID, NORMAL};

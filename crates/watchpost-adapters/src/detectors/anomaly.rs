//! After-hours activity detection.

use anyhow::{ensure, Result};
use image::GrayImage;
use watchpost_core::{ClassificationResult, Detector, Frame, Timestamp};

use super::active_hours::{ActiveHours, Gated, HourClock};
use super::motion;

/// Module id.
pub const ANOMALY_ID: &str = "anomaly_detector";
/// Status when activity is seen inside the active hours.
pub const ANOMALY: &str = "anomaly";
/// Status for a quiet scene.
pub const NORMAL: &str = "normal";

/// Tuning for [`AnomalyDetector`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyConfig {
    /// Hours during which any activity is anomalous.
    pub hours: ActiveHours,
    /// Mean frame difference, in gray levels, that counts as activity.
    pub activity_threshold: f32,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            hours: ActiveHours::new(16, 5).unwrap_or(ActiveHours::ALWAYS),
            activity_threshold: 0.2,
        }
    }
}

impl AnomalyConfig {
    /// Checks that the tuning values are usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the activity threshold is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.activity_threshold.is_finite() && self.activity_threshold >= 0.0,
            "anomaly activity threshold must be a non-negative number, got {}",
            self.activity_threshold
        );
        Ok(())
    }
}

/// Flags any scene activity. Use [`AnomalyDetector::scheduled`] to restrict
/// it to the configured hours.
pub struct AnomalyDetector {
    threshold: f32,
    previous: Option<GrayImage>,
}

impl AnomalyDetector {
    /// Creates an ungated detector.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(config: &AnomalyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            threshold: config.activity_threshold,
            previous: None,
        })
    }

    /// Creates a detector gated on the local clock.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn scheduled(config: &AnomalyConfig) -> Result<Gated<Self>> {
        Ok(Gated::new(Self::new(config)?, config.hours))
    }

    /// Creates a detector gated on `clock`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn scheduled_with_clock<C: HourClock>(
        config: &AnomalyConfig,
        clock: C,
    ) -> Result<Gated<Self, C>> {
        Ok(Gated::with_clock(Self::new(config)?, config.hours, clock))
    }
}

impl Detector for AnomalyDetector {
    fn id(&self) -> &str {
        ANOMALY_ID
    }

    fn classify(&mut self, frame: &Frame, _timestamp: &Timestamp) -> Result<ClassificationResult> {
        let current = motion::prepare(&frame.image);
        let activity = match self.previous.take() {
            Some(prev) if prev.dimensions() == current.dimensions() => {
                Some(motion::mean_level(&motion::abs_diff(&prev, &current)?))
            }
            _ => None,
        };
        self.previous = Some(current);

        Ok(match activity {
            Some(level) if level > self.threshold => ClassificationResult::new(
                ANOMALY_ID,
                ANOMALY,
                1.0,
                format!("activity level {level:.2}"),
            ),
            Some(level) => {
                ClassificationResult::new(ANOMALY_ID, NORMAL, 0.0, format!("activity level {level:.2}"))
            }
            None => ClassificationResult::new(ANOMALY_ID, NORMAL, 0.0, "waiting for a reference frame"),
        })
    }

    fn reset(&mut self) {
        self.previous = None;
    }
}

//! Alert configuration and alert events.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::{ClassificationResult, Timestamp};

/// Per-module alerting configuration supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Status labels that count as alerting for this module.
    pub alerting_statuses: BTreeSet<String>,
    /// How long a run must last before the first alert fires.
    pub required_sustain: Duration,
    /// Minimum time between two alerts from this module.
    pub cooldown: Duration,
}

impl DetectorConfig {
    /// Creates a configuration from durations.
    #[must_use]
    pub fn new<I, S>(alerting_statuses: I, required_sustain: Duration, cooldown: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            alerting_statuses: alerting_statuses.into_iter().map(Into::into).collect(),
            required_sustain,
            cooldown,
        }
    }

    /// Creates a configuration from fractional seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if either duration is negative or not finite.
    pub fn from_secs<I, S>(alerting_statuses: I, sustain_secs: f64, cooldown_secs: f64) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::new(
            alerting_statuses,
            secs_to_duration("sustain", sustain_secs)?,
            secs_to_duration("cooldown", cooldown_secs)?,
        ))
    }

    /// Returns true if `status` is in the alerting set.
    #[must_use]
    pub fn is_alerting(&self, status: &str) -> bool {
        self.alerting_statuses.contains(status)
    }

    /// Required sustain in seconds.
    #[must_use]
    pub fn required_sustain_seconds(&self) -> f64 {
        self.required_sustain.as_secs_f64()
    }

    /// Cooldown in seconds.
    #[must_use]
    pub fn cooldown_seconds(&self) -> f64 {
        self.cooldown.as_secs_f64()
    }
}

fn secs_to_duration(name: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        bail!("{name} must be a non-negative number of seconds, got {secs}");
    }
    Ok(Duration::from_secs_f64(secs))
}

/// An alert emitted by the alert state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Module that raised the alert.
    #[serde(rename = "module")]
    pub module_id: String,
    /// When the alert fired.
    pub timestamp: Timestamp,
    /// Status reported on the frame that fired the alert.
    pub status: String,
    /// Confidence reported on that frame, in the module's own unit.
    pub confidence: f32,
    /// Details reported on that frame.
    pub details: String,
    /// How long the alerting run had lasted when the alert fired.
    pub sustained_seconds: f64,
}

impl AlertEvent {
    /// Builds an event from the result that triggered it.
    #[must_use]
    pub fn from_result(result: &ClassificationResult, timestamp: &Timestamp, sustained: Duration) -> Self {
        Self {
            module_id: result.module_id.clone(),
            timestamp: timestamp.clone(),
            status: result.status.clone(),
            confidence: result.confidence,
            details: result.details.clone(),
            sustained_seconds: sustained.as_secs_f64(),
        }
    }
}

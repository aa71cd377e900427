//! Altercation detection from sustained, widespread motion.
//!
//! Each frame is differenced against the previous one and the share of moving
//! pixels is averaged over a short window. Frames whose smoothed motion is
//! above the threshold are `agitated`. The detector only reports
//! `violence_detected` once the smoothed motion has stayed above its threshold
//! for `required_duration` and more than `report_interval` has passed since
//! its previous report, so it debounces itself.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{ensure, Result};
use image::GrayImage;
use tracing::debug;
use watchpost_core::{ClassificationResult, Detector, Frame, Timestamp};

use super::motion;

/// Module id.
pub const ALTERCATION_ID: &str = "altercation_detector";
/// Status while nothing is going on.
pub const NO_VIOLENCE: &str = "no_violence";
/// Status while smoothed motion is above the threshold but no report is due.
pub const AGITATED: &str = "agitated";
/// Status on a sustained motion report.
pub const VIOLENCE_DETECTED: &str = "violence_detected";

/// Tuning for [`AltercationDetector`].
#[derive(Debug, Clone, PartialEq)]
pub struct AltercationConfig {
    /// Smoothed motion percentage above which the scene counts as agitated.
    pub motion_threshold_pct: f32,
    /// Number of frames averaged.
    pub window: usize,
    /// Per-pixel difference that counts as motion.
    pub pixel_threshold: u8,
    /// How long motion must stay elevated before a report.
    pub required_duration: Duration,
    /// Minimum gap between two reports.
    pub report_interval: Duration,
}

impl Default for AltercationConfig {
    fn default() -> Self {
        Self {
            motion_threshold_pct: 10.0,
            window: 15,
            pixel_threshold: motion::DEFAULT_PIXEL_THRESHOLD,
            required_duration: Duration::from_secs(5),
            report_interval: Duration::from_secs(10),
        }
    }
}

impl AltercationConfig {
    /// Checks that the tuning values are usable.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty window or a threshold outside 0-100.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.window > 0, "altercation window must be at least one frame");
        ensure!(
            (0.0..=100.0).contains(&self.motion_threshold_pct),
            "altercation motion threshold must be within 0-100, got {}",
            self.motion_threshold_pct
        );
        Ok(())
    }
}

/// Frame-differencing altercation detector.
pub struct AltercationDetector {
    config: AltercationConfig,
    previous: Option<GrayImage>,
    history: VecDeque<f32>,
    elevated_since: Option<Duration>,
    last_report: Option<Duration>,
}

impl AltercationDetector {
    /// Creates a detector.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(config: AltercationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            history: VecDeque::with_capacity(config.window),
            config,
            previous: None,
            elevated_since: None,
            last_report: None,
        })
    }

    fn smoothed(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let len = self.history.len() as f32;
        self.history.iter().sum::<f32>() / len
    }

    fn push(&mut self, level: f32) {
        if self.history.len() == self.config.window {
            self.history.pop_front();
        }
        self.history.push_back(level);
    }

    fn should_report(&self, since: Duration, now: Duration) -> bool {
        let sustained = now.saturating_sub(since);
        let since_report = self
            .last_report
            .map_or(Duration::MAX, |last| now.saturating_sub(last));
        sustained >= self.config.required_duration && since_report > self.config.report_interval
    }
}

impl Detector for AltercationDetector {
    fn id(&self) -> &str {
        ALTERCATION_ID
    }

    fn classify(&mut self, frame: &Frame, timestamp: &Timestamp) -> Result<ClassificationResult> {
        let current = motion::prepare(&frame.image);
        let raw = match self.previous.take() {
            Some(prev) if prev.dimensions() == current.dimensions() => {
                motion::motion_percent(&motion::abs_diff(&prev, &current)?, self.config.pixel_threshold)
            }
            Some(_) => {
                debug!(frame = frame.index, "frame size changed, restarting motion history");
                self.reset();
                self.previous = Some(current);
                self.push(0.0);
                return Ok(quiet(0.0, "motion history restarted"));
            }
            None => {
                // No reference yet: counts as a still frame in the window.
                self.previous = Some(current);
                self.push(0.0);
                return Ok(quiet(0.0, "waiting for a reference frame"));
            }
        };
        self.previous = Some(current);

        self.push(raw);
        let level = self.smoothed();
        let now = timestamp.elapsed;

        if level <= self.config.motion_threshold_pct {
            self.elevated_since = None;
            return Ok(quiet(level, &format!("motion {level:.1}%")));
        }

        let since = *self.elevated_since.get_or_insert(now);
        if self.should_report(since, now) {
            self.last_report = Some(now);
            let held = now.saturating_sub(since).as_secs_f64();
            return Ok(ClassificationResult::new(
                ALTERCATION_ID,
                VIOLENCE_DETECTED,
                level,
                format!("sustained motion {level:.1}% for {held:.1}s"),
            ));
        }

        let held = now.saturating_sub(since).as_secs_f64();
        Ok(ClassificationResult::new(
            ALTERCATION_ID,
            AGITATED,
            level,
            format!("elevated motion {level:.1}% for {held:.1}s"),
        ))
    }

    fn reset(&mut self) {
        self.previous = None;
        self.history.clear();
        self.elevated_since = None;
    }
}

fn quiet(level: f32, details: &str) -> ClassificationResult {
    ClassificationResult::new(ALTERCATION_ID, NO_VIOLENCE, level, details)
}

//! Configuration file support for watchpost.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/watchpost/config.toml` (lowest priority)
//! - Project-local: `.watchpost.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General options.
    pub general: GeneralConfig,
    /// Detector invocation settings.
    pub pipeline: PipelineConfig,
    /// Output formatting settings.
    pub output: OutputConfig,
    /// Alert sink settings.
    pub sinks: SinksConfig,
    /// Altercation detector settings.
    pub altercation: AltercationSection,
    /// Anomaly detector settings.
    pub anomaly: AnomalySection,
}

/// General configuration options.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Playback rate of the frame directory.
    pub fps: Option<f64>,
    /// Stop after this many frames.
    pub max_frames: Option<usize>,
}

/// Detector invocation configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run each detector on its own worker thread.
    pub parallel: Option<bool>,
    /// Per-frame deadline for parallel detectors, in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Output formatting configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format: "json" or "jsonl".
    pub format: Option<String>,
    /// Pretty-print JSON output.
    pub pretty: Option<bool>,
    /// Emit one report per frame instead of alerts only.
    pub results: Option<bool>,
    /// Show progress bar.
    pub progress: Option<bool>,
}

/// Alert sink configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    /// Log each alert as a warning.
    pub log: Option<bool>,
    /// Ring the terminal bell on each alert.
    pub bell: Option<bool>,
}

/// Altercation detector configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AltercationSection {
    /// Enable/disable the detector.
    pub enabled: Option<bool>,
    /// Statuses that count as alerting.
    pub alerting_statuses: Option<Vec<String>>,
    /// Seconds an alerting run must last before an alert.
    pub sustain_secs: Option<f64>,
    /// Minimum seconds between two alerts.
    pub cooldown_secs: Option<f64>,
    /// Smoothed motion percentage that counts as agitated.
    pub motion_threshold_pct: Option<f32>,
    /// Frames averaged for smoothing.
    pub window: Option<usize>,
    /// Per-pixel difference that counts as motion (0-255).
    pub pixel_threshold: Option<u8>,
    /// Seconds of elevated motion before the detector reports.
    pub required_secs: Option<f64>,
    /// Minimum seconds between two detector reports.
    pub report_interval_secs: Option<f64>,
}

/// Anomaly detector configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AnomalySection {
    /// Enable/disable the detector.
    pub enabled: Option<bool>,
    /// Statuses that count as alerting.
    pub alerting_statuses: Option<Vec<String>>,
    /// Seconds an alerting run must last before an alert.
    pub sustain_secs: Option<f64>,
    /// Minimum seconds between two alerts.
    pub cooldown_secs: Option<f64>,
    /// First active hour (0-23).
    pub start_hour: Option<u8>,
    /// First hour after the active window (0-23).
    pub end_hour: Option<u8>,
    /// Mean frame difference, in gray levels, that counts as activity.
    pub activity_threshold: Option<f32>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/watchpost/config.toml`
    /// 2. Project-local: `.watchpost.toml` (searched up from cwd)
    ///
    /// Missing or unparseable files are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged values are out of range.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        config.validate().map_err(|e| anyhow::anyhow!("invalid config: {e}"))?;
        Ok(config)
    }

    /// Validate configuration values are within acceptable ranges.
    fn validate(&self) -> Result<(), String> {
        if let Some(fps) = self.general.fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(format!("general.fps must be positive, got {fps}"));
            }
        }
        if self.pipeline.timeout_ms == Some(0) {
            return Err("pipeline.timeout_ms must be at least 1".to_string());
        }

        for (name, value) in [
            ("altercation.sustain_secs", self.altercation.sustain_secs),
            ("altercation.cooldown_secs", self.altercation.cooldown_secs),
            ("altercation.required_secs", self.altercation.required_secs),
            ("altercation.report_interval_secs", self.altercation.report_interval_secs),
            ("anomaly.sustain_secs", self.anomaly.sustain_secs),
            ("anomaly.cooldown_secs", self.anomaly.cooldown_secs),
        ] {
            if let Some(secs) = value {
                if !(secs.is_finite() && secs >= 0.0) {
                    return Err(format!("{name} must be a non-negative number, got {secs}"));
                }
            }
        }

        if let Some(t) = self.altercation.motion_threshold_pct {
            if !(0.0..=100.0).contains(&t) {
                return Err(format!("altercation.motion_threshold_pct must be 0-100, got {t}"));
            }
        }
        if self.altercation.window == Some(0) {
            return Err("altercation.window must be at least 1".to_string());
        }

        for (name, value) in [
            ("anomaly.start_hour", self.anomaly.start_hour),
            ("anomaly.end_hour", self.anomaly.end_hour),
        ] {
            if let Some(hour) = value {
                if hour >= 24 {
                    return Err(format!("{name} must be 0-23, got {hour}"));
                }
            }
        }
        if let Some(t) = self.anomaly.activity_threshold {
            if !(t.is_finite() && t >= 0.0) {
                return Err(format!("anomaly.activity_threshold must be non-negative, got {t}"));
            }
        }

        if let Some(ref f) = self.output.format {
            if f != "json" && f != "jsonl" {
                return Err(format!(
                    "output.format must be 'json' or 'jsonl', got '{f}'"
                ));
            }
        }

        Ok(())
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        // General
        self.general.fps = other.general.fps.or(self.general.fps);
        self.general.max_frames = other.general.max_frames.or(self.general.max_frames);

        // Pipeline
        self.pipeline.parallel = other.pipeline.parallel.or(self.pipeline.parallel);
        self.pipeline.timeout_ms = other.pipeline.timeout_ms.or(self.pipeline.timeout_ms);

        // Output
        self.output.format = other.output.format.or_else(|| self.output.format.take());
        self.output.pretty = other.output.pretty.or(self.output.pretty);
        self.output.results = other.output.results.or(self.output.results);
        self.output.progress = other.output.progress.or(self.output.progress);

        // Sinks
        self.sinks.log = other.sinks.log.or(self.sinks.log);
        self.sinks.bell = other.sinks.bell.or(self.sinks.bell);

        // Altercation
        let (a, b) = (&mut self.altercation, other.altercation);
        a.enabled = b.enabled.or(a.enabled);
        a.alerting_statuses = b.alerting_statuses.or_else(|| a.alerting_statuses.take());
        a.sustain_secs = b.sustain_secs.or(a.sustain_secs);
        a.cooldown_secs = b.cooldown_secs.or(a.cooldown_secs);
        a.motion_threshold_pct = b.motion_threshold_pct.or(a.motion_threshold_pct);
        a.window = b.window.or(a.window);
        a.pixel_threshold = b.pixel_threshold.or(a.pixel_threshold);
        a.required_secs = b.required_secs.or(a.required_secs);
        a.report_interval_secs = b.report_interval_secs.or(a.report_interval_secs);

        // Anomaly
        let (a, b) = (&mut self.anomaly, other.anomaly);
        a.enabled = b.enabled.or(a.enabled);
        a.alerting_statuses = b.alerting_statuses.or_else(|| a.alerting_statuses.take());
        a.sustain_secs = b.sustain_secs.or(a.sustain_secs);
        a.cooldown_secs = b.cooldown_secs.or(a.cooldown_secs);
        a.start_hour = b.start_hour.or(a.start_hour);
        a.end_hour = b.end_hour.or(a.end_hour);
        a.activity_threshold = b.activity_threshold.or(a.activity_threshold);
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("watchpost").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.watchpost.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(".watchpost.toml");
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

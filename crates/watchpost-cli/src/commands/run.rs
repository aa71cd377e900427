//! Run command - replay a directory of frames through the detectors.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::{debug, info, warn};
use watchpost_adapters::detectors::{ALTERCATION_ID, ANOMALY_ID};
use watchpost_adapters::{
    ActiveHours, AltercationConfig, AltercationDetector, AnomalyConfig, AnomalyDetector, BellSink,
    DirFrameSource, JsonLinesSink, LogSink,
};
use watchpost_core::{
    Detector, DetectorConfig, FrameSource, InvocationMode, Orchestrator, RunSummary, StopHandle,
};

use super::ExitCode;
use crate::config::AppConfig;
use crate::output::{Fanout, ProgressBar, ReportMode, ReportWriter};

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON Lines (one JSON object per line)
    #[default]
    Jsonl,
    /// Single JSON document at the end of the run
    Json,
}

/// Hardcoded default values.
pub(crate) mod defaults {
    pub const FPS: f64 = 10.0;
    pub const TIMEOUT_MS: u64 = 1000;

    // An agitated run that reaches the detector's own report alerts once;
    // sustain 0 with only `violence_detected` leaves spacing to the detector.
    pub const ALTERCATION_STATUSES: &[&str] = &["agitated", "violence_detected"];
    pub const ALTERCATION_SUSTAIN_SECS: f64 = 5.0;
    pub const ALTERCATION_COOLDOWN_SECS: f64 = 10.0;

    pub const ANOMALY_STATUSES: &[&str] = &["anomaly"];
    pub const ANOMALY_SUSTAIN_SECS: f64 = 2.0;
    pub const ANOMALY_COOLDOWN_SECS: f64 = 30.0;
    pub const ANOMALY_START_HOUR: u8 = 16;
    pub const ANOMALY_END_HOUR: u8 = 5;
}

/// Parse and validate a frame rate.
fn parse_fps(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("{value} is not a positive frame rate"))
    }
}

/// Arguments for replaying frames.
#[derive(Args, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Directory of frame images, played in file-name order
    pub dir: Option<PathBuf>,

    /// Playback rate used to timestamp frames
    #[arg(long, value_parser = parse_fps)]
    pub fps: Option<f64>,

    /// Stop after this many frames
    #[arg(long, value_name = "N")]
    pub max_frames: Option<usize>,

    /// Run each detector on its own worker thread
    #[arg(long)]
    pub parallel: bool,

    /// Per-frame deadline for parallel detectors
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,

    /// Emit one report per frame instead of alerts only
    #[arg(long)]
    pub results: bool,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Pretty-print JSON output (only affects --format json)
    #[arg(long)]
    pub pretty: bool,

    /// Disable the altercation detector
    #[arg(long)]
    pub no_altercation: bool,

    /// Disable the anomaly detector
    #[arg(long)]
    pub no_anomaly: bool,

    /// Ring the terminal bell on every alert
    #[arg(long)]
    pub bell: bool,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,

    /// Suppress progress and summary output
    #[arg(short, long)]
    pub quiet: bool,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: AppConfig,
}

impl RunArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Hardcoded defaults (in accessor methods)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        args.fps = args.fps.or(config.general.fps);
        args.max_frames = args.max_frames.or(config.general.max_frames);
        args.timeout_ms = args.timeout_ms.or(config.pipeline.timeout_ms);

        if !args.parallel {
            args.parallel = config.pipeline.parallel.unwrap_or(false);
        }

        // CLI --no-* wins; otherwise the config may disable a detector.
        if !args.no_altercation {
            if let Some(enabled) = config.altercation.enabled {
                args.no_altercation = !enabled;
            }
        }
        if !args.no_anomaly {
            if let Some(enabled) = config.anomaly.enabled {
                args.no_anomaly = !enabled;
            }
        }

        if args.format.is_none() {
            args.format = config
                .output
                .format
                .as_ref()
                .and_then(|s| match s.as_str() {
                    "json" => Some(OutputFormat::Json),
                    "jsonl" => Some(OutputFormat::Jsonl),
                    _ => None,
                });
        }
        if !args.pretty {
            args.pretty = config.output.pretty.unwrap_or(false);
        }
        if !args.results {
            args.results = config.output.results.unwrap_or(false);
        }
        if !args.progress {
            args.progress = config.output.progress.unwrap_or(false);
        }
        if !args.bell {
            args.bell = config.sinks.bell.unwrap_or(false);
        }

        args.config = config.clone();
        args
    }

    fn fps(&self) -> f64 {
        self.fps.unwrap_or(defaults::FPS)
    }

    fn format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }

    fn mode(&self) -> InvocationMode {
        if self.parallel {
            InvocationMode::Parallel {
                timeout: Duration::from_millis(self.timeout_ms.unwrap_or(defaults::TIMEOUT_MS)),
            }
        } else {
            InvocationMode::Sequential
        }
    }

    fn log_sink(&self) -> bool {
        self.config.sinks.log.unwrap_or(true)
    }
}

/// A detector ready to register, with the settings it will run under.
pub struct PlannedDetector {
    /// Module id.
    pub id: &'static str,
    /// One-line description.
    pub description: String,
    /// Whether it will be registered.
    pub enabled: bool,
    /// Alerting configuration.
    pub alert: DetectorConfig,
    /// The detector itself.
    pub detector: Box<dyn Detector>,
}

/// Builds every known detector from merged args and config.
///
/// # Errors
///
/// Returns an error if a detector's settings are invalid.
pub fn plan_detectors(args: &RunArgs) -> Result<Vec<PlannedDetector>> {
    let config = &args.config;

    let section = &config.altercation;
    let base = AltercationConfig::default();
    let tuning = AltercationConfig {
        motion_threshold_pct: section.motion_threshold_pct.unwrap_or(base.motion_threshold_pct),
        window: section.window.unwrap_or(base.window),
        pixel_threshold: section.pixel_threshold.unwrap_or(base.pixel_threshold),
        required_duration: section
            .required_secs
            .map_or(base.required_duration, Duration::from_secs_f64),
        report_interval: section
            .report_interval_secs
            .map_or(base.report_interval, Duration::from_secs_f64),
    };
    let altercation = PlannedDetector {
        id: ALTERCATION_ID,
        description: format!(
            "sustained motion above {:.1}% for {:.0}s",
            tuning.motion_threshold_pct,
            tuning.required_duration.as_secs_f64()
        ),
        enabled: !args.no_altercation,
        alert: DetectorConfig::from_secs(
            statuses(section.alerting_statuses.as_ref(), defaults::ALTERCATION_STATUSES),
            section.sustain_secs.unwrap_or(defaults::ALTERCATION_SUSTAIN_SECS),
            section.cooldown_secs.unwrap_or(defaults::ALTERCATION_COOLDOWN_SECS),
        )
        .context("Invalid altercation alert settings")?,
        detector: Box::new(AltercationDetector::new(tuning)?),
    };

    let section = &config.anomaly;
    let tuning = AnomalyConfig {
        hours: ActiveHours::new(
            section.start_hour.unwrap_or(defaults::ANOMALY_START_HOUR),
            section.end_hour.unwrap_or(defaults::ANOMALY_END_HOUR),
        )?,
        activity_threshold: section
            .activity_threshold
            .unwrap_or(AnomalyConfig::default().activity_threshold),
    };
    let anomaly = PlannedDetector {
        id: ANOMALY_ID,
        description: format!("any activity during {}", tuning.hours),
        enabled: !args.no_anomaly,
        alert: DetectorConfig::from_secs(
            statuses(section.alerting_statuses.as_ref(), defaults::ANOMALY_STATUSES),
            section.sustain_secs.unwrap_or(defaults::ANOMALY_SUSTAIN_SECS),
            section.cooldown_secs.unwrap_or(defaults::ANOMALY_COOLDOWN_SECS),
        )
        .context("Invalid anomaly alert settings")?,
        detector: Box::new(AnomalyDetector::scheduled(&tuning)?),
    };

    Ok(vec![altercation, anomaly])
}

fn statuses(configured: Option<&Vec<String>>, fallback: &[&str]) -> Vec<String> {
    configured.map_or_else(
        || fallback.iter().map(ToString::to_string).collect(),
        Clone::clone,
    )
}

/// Result of running the run command.
pub struct RunOutcome {
    /// Totals for the run.
    pub summary: RunSummary,
    /// Exit code.
    pub exit_code: ExitCode,
}

/// Run the run command.
///
/// Expects `args` to have been processed through `with_config()` first
/// to apply configuration file settings.
pub fn run(args: &RunArgs) -> Result<RunOutcome> {
    let dir = args
        .dir
        .as_ref()
        .context("No frame directory specified. Use --help for usage information.")?;
    info!("Replaying frames from {}", dir.display());

    let mut source = DirFrameSource::new(dir, args.fps())?;
    if let Some(max) = args.max_frames {
        source = source.limit(max);
    }

    let mut builder = Orchestrator::builder().mode(args.mode());
    let mut registered = 0usize;
    for planned in plan_detectors(args)? {
        if planned.enabled {
            debug!("Enabled {}", planned.id);
            builder = builder.register_boxed(planned.detector, planned.alert);
            registered += 1;
        }
    }

    if registered == 0 {
        warn!("All detectors disabled, nothing to run");
        return Ok(RunOutcome {
            summary: RunSummary::default(),
            exit_code: ExitCode::Success,
        });
    }

    if args.log_sink() {
        builder = builder.sink(LogSink);
    }
    if args.format() == OutputFormat::Jsonl && !args.results {
        builder = builder.sink(JsonLinesSink::stdout());
    }
    if args.bell {
        builder = builder.sink(BellSink::stderr());
    }
    let mut orchestrator = builder.build()?;

    let show_bar = !args.quiet && (args.progress || std::io::stderr().is_terminal());
    let progress = ProgressBar::new(args.quiet, show_bar);
    let writer = match (args.format(), args.results) {
        (OutputFormat::Jsonl, true) => Some(ReportWriter::stdout(ReportMode::FrameLines)),
        (OutputFormat::Jsonl, false) => None,
        (OutputFormat::Json, frames) => Some(ReportWriter::stdout(ReportMode::Document {
            frames,
            pretty: args.pretty,
        })),
    };

    let mut observers: Vec<&dyn watchpost_core::PipelineObserver> = vec![&progress];
    if let Some(writer) = &writer {
        observers.push(writer);
    }

    let stop = StopHandle::new();
    install_interrupt_handler(&stop);

    debug!("Frame count hint: {:?}", source.count_hint());
    let summary = orchestrator.run(&mut source, &Fanout(observers), &stop);
    if summary.cancelled {
        warn!("Interrupted, stopped after {} frames", summary.frames_processed);
    }

    if let Some(writer) = &writer {
        writer.finish()?;
    }

    let exit_code = if summary.alerts_fired > 0 {
        ExitCode::AlertsFired
    } else {
        ExitCode::Success
    };

    Ok(RunOutcome { summary, exit_code })
}

/// Turns the first Ctrl-C or SIGTERM into a clean stop between frames, so
/// the summary and any pending output are still written. A second one exits
/// at once.
fn install_interrupt_handler(stop: &StopHandle) {
    let stop = stop.clone();
    let installed = ctrlc::set_handler(move || {
        if stop.is_stopped() {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        stop.stop();
    });
    if let Err(e) = installed {
        warn!("Failed to install interrupt handler: {e}");
    }
}

/// Conventional exit status for a process killed by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

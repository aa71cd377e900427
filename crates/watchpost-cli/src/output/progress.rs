//! Progress bar adapter using indicatif.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};
use watchpost_core::{PipelineEvent, PipelineObserver};

/// Progress and summary reporting on stderr.
pub struct ProgressBar {
    bar: Option<IndicatifBar>,
    quiet: bool,
}

impl ProgressBar {
    /// Creates a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, suppress all output
    /// * `show_bar` - If true, draw a progress bar while frames are processed
    #[must_use]
    pub fn new(quiet: bool, show_bar: bool) -> Self {
        if quiet {
            return Self {
                bar: None,
                quiet: true,
            };
        }

        let bar = show_bar.then(|| {
            let bar = IndicatifBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        });

        Self { bar, quiet }
    }
}

impl PipelineObserver for ProgressBar {
    fn on_event(&self, event: PipelineEvent) {
        if self.quiet {
            return;
        }

        match event {
            PipelineEvent::Started { modules, total } => {
                if let Some(bar) = &self.bar {
                    if let Some(t) = total {
                        bar.set_length(t as u64);
                    }
                    bar.set_message(modules.join(", "));
                }
            }
            PipelineEvent::FrameProcessed { report } => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                    if !report.alerts.is_empty() {
                        bar.set_message(format!("alert on frame {}", report.frame));
                    }
                }
            }
            PipelineEvent::FrameSkipped { index, reason } => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                }
                eprintln!("WARN: Skipping frame {index}: {reason}");
            }
            PipelineEvent::Finished { summary } => {
                let message = format!(
                    "Done: {} frames processed, {} skipped, {} alert(s){}",
                    summary.frames_processed,
                    summary.frames_skipped,
                    summary.alerts_fired,
                    if summary.cancelled { " (stopped early)" } else { "" }
                );
                if let Some(bar) = &self.bar {
                    bar.finish_with_message(message);
                } else {
                    eprintln!("{message}");
                }
            }
        }
    }
}

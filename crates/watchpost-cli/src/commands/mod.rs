//! CLI command definitions and handlers.

pub mod detectors;
pub mod run;

use clap::{Parser, Subcommand};

/// Watchpost - debounced alerting over per-frame video detectors
#[derive(Parser)]
#[command(name = "watchpost")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Shared run arguments (frame directory, flags).
    #[command(flatten)]
    pub run: run::RunArgs,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Replay a directory of frames through the detectors
    Run(run::RunArgs),
    /// List the available detectors and their alert settings
    Detectors(detectors::DetectorsArgs),
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Run completed without alerts.
    Success = 0,
    /// At least one alert fired.
    AlertsFired = 1,
    /// The run could not be completed.
    Error = 2,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}

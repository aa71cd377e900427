//! Watchpost CLI - Debounced alerting over video frames.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::run::RunArgs;
use commands::{Cli, Commands, ExitCode};
use config::AppConfig;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::Error.into();
        }
    };

    let exit_code = match cli.command {
        Some(Commands::Run(args)) => run(RunArgs::with_config(args, &config)),
        Some(Commands::Detectors(ref args)) => {
            let run_args = RunArgs::with_config(cli.run.clone(), &config);
            match commands::detectors::run(args, &run_args) {
                Ok(()) => ExitCode::Success,
                Err(e) => {
                    eprintln!("error: {e:#}");
                    ExitCode::Error
                }
            }
        }
        None => run(RunArgs::with_config(cli.run, &config)),
    };

    exit_code.into()
}

fn run(args: RunArgs) -> ExitCode {
    match commands::run::run(&args) {
        Ok(outcome) => {
            tracing::info!(
                frames = outcome.summary.frames_processed,
                skipped = outcome.summary.frames_skipped,
                alerts = outcome.summary.alerts_fired,
                errors = outcome.summary.module_errors,
                "run complete"
            );
            outcome.exit_code
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::Error
        }
    }
}

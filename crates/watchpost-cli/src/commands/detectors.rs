//! Detectors command - list the available detectors and their alert settings.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::run::{plan_detectors, PlannedDetector, RunArgs};

/// Arguments for listing detectors.
#[derive(Args, Clone, Default)]
pub struct DetectorsArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct Listing<'a> {
    id: &'a str,
    enabled: bool,
    description: &'a str,
    alerting_statuses: Vec<&'a str>,
    sustain_secs: f64,
    cooldown_secs: f64,
}

impl<'a> From<&'a PlannedDetector> for Listing<'a> {
    fn from(planned: &'a PlannedDetector) -> Self {
        Self {
            id: planned.id,
            enabled: planned.enabled,
            description: &planned.description,
            alerting_statuses: planned
                .alert
                .alerting_statuses
                .iter()
                .map(String::as_str)
                .collect(),
            sustain_secs: planned.alert.required_sustain_seconds(),
            cooldown_secs: planned.alert.cooldown_seconds(),
        }
    }
}

/// Run the detectors command.
///
/// `run_args` carries the merged configuration the detectors would run with.
pub fn run(args: &DetectorsArgs, run_args: &RunArgs) -> Result<()> {
    let planned = plan_detectors(run_args)?;
    let listings: Vec<Listing<'_>> = planned.iter().map(Listing::from).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    for listing in &listings {
        println!(
            "{:<22} {:<9} alerting=[{}] sustain={}s cooldown={}s  {}",
            listing.id,
            if listing.enabled { "enabled" } else { "disabled" },
            listing.alerting_statuses.join(", "),
            listing.sustain_secs,
            listing.cooldown_secs,
            listing.description
        );
    }
    Ok(())
}

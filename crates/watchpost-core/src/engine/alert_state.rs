//! Per-module debounce and cooldown state machine.
//!
//! A module is `Idle` until it reports a status from its alerting set, then
//! `Active` for as long as every following frame stays inside that set. The
//! run is keyed by module, not by label, so flipping between two alerting
//! labels keeps the run alive. An alert fires once the run has lasted
//! `required_sustain` and the module is out of cooldown. While the run goes on,
//! each elapsed cooldown re-arms the run for another alert. The first
//! non-alerting status ends the run immediately.

use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{AlertEvent, ClassificationResult, DetectorConfig, Timestamp};

/// Alert bookkeeping for one registered module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertState {
    active_since: Option<Duration>,
    fired_for_run: bool,
    last_fired_at: Option<Duration>,
}

impl AlertState {
    /// Creates an idle state that has never fired.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active_since: None,
            fired_for_run: false,
            last_fired_at: None,
        }
    }

    /// Start of the current alerting run, if any.
    #[must_use]
    pub const fn active_since(&self) -> Option<Duration> {
        self.active_since
    }

    /// Whether the current run has already produced an alert.
    #[must_use]
    pub const fn fired_for_run(&self) -> bool {
        self.fired_for_run
    }

    /// Time of the most recent alert.
    #[must_use]
    pub const fn last_fired_at(&self) -> Option<Duration> {
        self.last_fired_at
    }

    /// Returns true while an alerting run is in progress.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active_since.is_some()
    }

    /// Advances the state machine by one frame.
    ///
    /// Returns the alert to dispatch, if this frame fired one.
    pub fn step(
        &mut self,
        config: &DetectorConfig,
        result: &ClassificationResult,
        now: &Timestamp,
    ) -> Option<AlertEvent> {
        let module = result.module_id.as_str();

        if !config.is_alerting(&result.status) {
            if self.active_since.take().is_some() {
                debug!(module, status = %result.status, "alerting run ended");
            }
            self.fired_for_run = false;
            return None;
        }

        let at = now.elapsed;
        let since = if let Some(since) = self.active_since {
            since
        } else {
            debug!(module, status = %result.status, "alerting run started");
            self.active_since = Some(at);
            self.fired_for_run = false;
            at
        };

        let since_last_fire = self
            .last_fired_at
            .map(|last| elapsed_between(module, last, at));
        let cooled_down = since_last_fire.map_or(true, |elapsed| elapsed >= config.cooldown);

        if self.fired_for_run && cooled_down {
            debug!(module, "cooldown elapsed during run, re-arming");
            self.fired_for_run = false;
        }

        let sustained = elapsed_between(module, since, at);
        if sustained < config.required_sustain || self.fired_for_run || !cooled_down {
            return None;
        }

        self.fired_for_run = true;
        self.last_fired_at = Some(at);
        Some(AlertEvent::from_result(result, now, sustained))
    }
}

/// `to - from`, clamped to zero when the clock went backwards.
fn elapsed_between(module: &str, from: Duration, to: Duration) -> Duration {
    to.checked_sub(from).unwrap_or_else(|| {
        warn!(
            module,
            from_secs = from.as_secs_f64(),
            to_secs = to.as_secs_f64(),
            "timestamp went backwards, clamping elapsed time to zero"
        );
        Duration::ZERO
    })
}

//! Time-of-day gating for detectors.

use std::fmt;

use anyhow::{ensure, Result};
use time::OffsetDateTime;
use tracing::debug;
use watchpost_core::{ClassificationResult, Detector, Frame, Timestamp};

/// Status reported by a gated detector outside its active hours.
pub const INACTIVE_STATUS: &str = "inactive";

/// A daily window of whole hours, `[start_hour, end_hour)`.
///
/// A window whose start is after its end wraps past midnight. Equal start and
/// end means the window covers the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveHours {
    start_hour: u8,
    end_hour: u8,
}

impl ActiveHours {
    /// The whole day.
    pub const ALWAYS: Self = Self {
        start_hour: 0,
        end_hour: 0,
    };

    /// Creates a window.
    ///
    /// # Errors
    ///
    /// Returns an error if either hour is 24 or more.
    pub fn new(start_hour: u8, end_hour: u8) -> Result<Self> {
        ensure!(start_hour < 24, "start hour must be below 24, got {start_hour}");
        ensure!(end_hour < 24, "end hour must be below 24, got {end_hour}");
        Ok(Self {
            start_hour,
            end_hour,
        })
    }

    /// First hour of the window.
    #[must_use]
    pub const fn start_hour(&self) -> u8 {
        self.start_hour
    }

    /// First hour after the window.
    #[must_use]
    pub const fn end_hour(&self) -> u8 {
        self.end_hour
    }

    /// Returns true if `hour` falls inside the window.
    #[must_use]
    pub const fn contains(&self, hour: u8) -> bool {
        if self.start_hour == self.end_hour {
            true
        } else if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

impl fmt::Display for ActiveHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00-{:02}:00", self.start_hour, self.end_hour)
    }
}

/// Source of the current hour of day.
pub trait HourClock: Send {
    /// Current hour, 0-23.
    fn hour(&self) -> u8;
}

/// Reads the local wall clock, falling back to UTC when the local offset is
/// unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl HourClock for LocalClock {
    fn hour(&self) -> u8 {
        OffsetDateTime::now_local()
            .unwrap_or_else(|_| {
                debug!("local UTC offset unavailable, using UTC");
                OffsetDateTime::now_utc()
            })
            .hour()
    }
}

/// A clock stuck at one hour.
#[derive(Debug, Clone, Copy)]
pub struct FixedHour(pub u8);

impl HourClock for FixedHour {
    fn hour(&self) -> u8 {
        self.0
    }
}

/// Wraps a detector so that it only runs inside its active hours.
///
/// Outside the window the wrapped detector is not called and the result is
/// `inactive` with zero confidence. When the window closes the wrapped
/// detector is reset, so the first frame after it reopens is never compared
/// with one from before the gap.
pub struct Gated<D, C = LocalClock> {
    inner: D,
    hours: ActiveHours,
    clock: C,
    open: bool,
}

impl<D: Detector> Gated<D> {
    /// Gates `inner` on the local wall clock.
    #[must_use]
    pub const fn new(inner: D, hours: ActiveHours) -> Self {
        Self {
            inner,
            hours,
            clock: LocalClock,
            open: true,
        }
    }
}

impl<D: Detector, C: HourClock> Gated<D, C> {
    /// Gates `inner` on a custom clock.
    #[must_use]
    pub const fn with_clock(inner: D, hours: ActiveHours, clock: C) -> Self {
        Self {
            inner,
            hours,
            clock,
            open: true,
        }
    }

    /// The active window.
    #[must_use]
    pub const fn hours(&self) -> ActiveHours {
        self.hours
    }
}

impl<D: Detector, C: HourClock> Detector for Gated<D, C> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn classify(&mut self, frame: &Frame, timestamp: &Timestamp) -> Result<ClassificationResult> {
        let hour = self.clock.hour();
        if self.hours.contains(hour) {
            if !self.open {
                debug!(module = self.inner.id(), hour, "active hours started");
                self.open = true;
            }
            return self.inner.classify(frame, timestamp);
        }
        if self.open {
            debug!(module = self.inner.id(), hour, "active hours ended, resetting detector");
            self.inner.reset();
            self.open = false;
        }
        Ok(ClassificationResult::new(
            self.inner.id(),
            INACTIVE_STATUS,
            0.0,
            format!("outside active hours {}", self.hours),
        ))
    }
}

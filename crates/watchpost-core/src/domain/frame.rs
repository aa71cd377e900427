//! Frame and timestamp types passed to every detector.

use std::time::Duration;

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// A single video frame.
///
/// The buffer is row-major RGB with one byte per channel. Detectors only ever
/// receive a shared reference, so a module that wants to draw on the frame
/// has to clone it first.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position of the frame in the stream (0-based).
    pub index: u64,
    /// Decoded pixel data.
    pub image: RgbImage,
}

impl Frame {
    /// Creates a frame from an RGB buffer.
    #[must_use]
    pub const fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Frame width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// When a frame was captured.
///
/// `elapsed` is the monotonic offset from the start of the stream and is the
/// only clock the alert state machine looks at. `wall_clock` is informational.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    /// Offset from the start of the stream.
    #[serde(rename = "elapsed_secs", with = "secs")]
    pub elapsed: Duration,
    /// Wall-clock capture time (`YYYY-MM-DD HH:MM:SS`), if known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub wall_clock: Option<String>,
}

impl Timestamp {
    /// Creates a timestamp with no wall-clock component.
    #[must_use]
    pub const fn at(elapsed: Duration) -> Self {
        Self {
            elapsed,
            wall_clock: None,
        }
    }

    /// Creates a timestamp from fractional seconds. Negative or non-finite
    /// input is clamped to zero.
    #[must_use]
    pub fn from_secs_f64(secs: f64) -> Self {
        let elapsed = if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        };
        Self::at(elapsed)
    }

    /// Attaches a wall-clock string.
    #[must_use]
    pub fn with_wall_clock(mut self, wall_clock: impl Into<String>) -> Self {
        self.wall_clock = Some(wall_clock.into());
        self
    }

    /// Offset from stream start in seconds.
    #[must_use]
    pub fn as_secs_f64(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Serializes a `Duration` as fractional seconds.
pub(crate) mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

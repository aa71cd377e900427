//! Synthetic frame builders for testing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use watchpost_core::{Frame, TimedFrame, Timestamp};

/// Builder for synthetic frames and frame sequences.
///
/// Still sequences produce no frame-to-frame difference; moving sequences
/// alternate a checkerboard with its inverse so every pixel changes.
pub struct SyntheticFrameBuilder;

impl SyntheticFrameBuilder {
    // === Single images ===

    /// Creates a uniform gray image.
    #[must_use]
    pub fn uniform(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    /// Creates a black and white checkerboard.
    #[must_use]
    pub fn checkerboard(width: u32, height: u32, cell_size: u32) -> RgbImage {
        Self::shifted_checkerboard(width, height, cell_size, 0)
    }

    /// Creates a checkerboard shifted right by `shift` pixels.
    ///
    /// A shift of one cell size gives the inverse of [`Self::checkerboard`].
    #[must_use]
    pub fn shifted_checkerboard(width: u32, height: u32, cell_size: u32, shift: u32) -> RgbImage {
        let cell = cell_size.max(1);
        RgbImage::from_fn(width, height, |x, y| {
            if ((x + shift) / cell + y / cell) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    // === Sequences ===

    /// `count` identical mid-gray frames.
    #[must_use]
    pub fn still_sequence(count: usize, width: u32, height: u32) -> Vec<RgbImage> {
        vec![Self::uniform(width, height, 128); count]
    }

    /// `count` frames alternating a checkerboard and its inverse.
    #[must_use]
    pub fn moving_sequence(count: usize, width: u32, height: u32) -> Vec<RgbImage> {
        let cell = (width.min(height) / 8).max(1);
        (0..count)
            .map(|i| Self::shifted_checkerboard(width, height, cell, if i % 2 == 0 { 0 } else { cell }))
            .collect()
    }

    /// Stamps images as frames captured at `fps`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn timed(images: Vec<RgbImage>, fps: f64) -> Vec<TimedFrame> {
        images
            .into_iter()
            .enumerate()
            .map(|(i, image)| TimedFrame {
                frame: Frame::new(i as u64, image),
                timestamp: Timestamp::at(Duration::from_secs_f64(i as f64 / fps)),
            })
            .collect()
    }

    /// Writes images to `dir` as `frame_0000.png`, `frame_0001.png`, ...
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub fn write_png_sequence(dir: &Path, images: &[RgbImage]) -> Result<Vec<PathBuf>> {
        images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                let path = dir.join(format!("frame_{i:04}.png"));
                image
                    .save(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                Ok(path)
            })
            .collect()
    }
}

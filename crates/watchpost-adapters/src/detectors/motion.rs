//! Frame differencing primitives shared by the motion-based detectors.

use anyhow::{ensure, Result};
use image::{imageops, GrayImage, RgbImage};

/// Per-pixel difference (0-255) above which a pixel counts as moving.
pub const DEFAULT_PIXEL_THRESHOLD: u8 = 25;

/// Gaussian sigma equivalent to a 21x21 smoothing kernel.
pub const SMOOTHING_SIGMA: f32 = 3.5;

/// Converts a frame to a smoothed grayscale image ready for differencing.
#[must_use]
pub fn prepare(image: &RgbImage) -> GrayImage {
    let gray = imageops::grayscale(image);
    imageops::blur(&gray, SMOOTHING_SIGMA)
}

/// Absolute per-pixel difference of two equally sized grayscale images.
///
/// # Errors
///
/// Returns an error if the images differ in size.
pub fn abs_diff(a: &GrayImage, b: &GrayImage) -> Result<GrayImage> {
    ensure!(
        a.dimensions() == b.dimensions(),
        "cannot diff {}x{} against {}x{}",
        a.width(),
        a.height(),
        b.width(),
        b.height()
    );

    let mut out = GrayImage::new(a.width(), a.height());
    for ((o, pa), pb) in out.pixels_mut().zip(a.pixels()).zip(b.pixels()) {
        o.0[0] = pa.0[0].abs_diff(pb.0[0]);
    }
    Ok(out)
}

/// Percentage (0-100) of pixels whose difference exceeds `threshold`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn motion_percent(diff: &GrayImage, threshold: u8) -> f32 {
    let total = diff.pixels().len();
    if total == 0 {
        return 0.0;
    }
    let moving = diff.pixels().filter(|p| p.0[0] > threshold).count();
    moving as f32 / total as f32 * 100.0
}

/// Mean absolute difference in gray levels (0-255).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_level(diff: &GrayImage) -> f32 {
    let total = diff.pixels().len();
    if total == 0 {
        return 0.0;
    }
    let sum: u64 = diff.pixels().map(|p| u64::from(p.0[0])).sum();
    (sum as f64 / total as f64) as f32
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Luma;

    fn filled(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    #[test]
    fn test_abs_diff_is_symmetric() {
        let a = filled(4, 4, 10);
        let b = filled(4, 4, 200);
        let ab = abs_diff(&a, &b).unwrap();
        let ba = abs_diff(&b, &a).unwrap();
        assert_eq!(ab, ba);
        assert!(ab.pixels().all(|p| p.0[0] == 190));
    }

    #[test]
    fn test_abs_diff_rejects_size_mismatch() {
        let err = abs_diff(&filled(4, 4, 0), &filled(4, 5, 0)).unwrap_err();
        assert!(err.to_string().contains("4x4"));
    }

    #[test]
    fn test_motion_percent() {
        let mut diff = filled(10, 10, 0);
        for x in 0..10 {
            diff.put_pixel(x, 0, Luma([200]));
        }
        assert!((motion_percent(&diff, DEFAULT_PIXEL_THRESHOLD) - 10.0).abs() < 1e-4);
        assert!(motion_percent(&filled(3, 3, 25), 25).abs() < f32::EPSILON);
        assert!(motion_percent(&GrayImage::new(0, 0), 25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mean_level() {
        let mut diff = filled(2, 1, 0);
        diff.put_pixel(1, 0, Luma([100]));
        assert!((mean_level(&diff) - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_prepare_keeps_uniform_frames_uniform() {
        let frame = RgbImage::from_pixel(32, 32, image::Rgb([90, 90, 90]));
        let gray = prepare(&frame);
        assert_eq!(gray.dimensions(), (32, 32));
        assert!(gray.pixels().all(|p| p.0[0].abs_diff(90) <= 1));
    }
}

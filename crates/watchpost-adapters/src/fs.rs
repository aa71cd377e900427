//! Filesystem adapter that replays a directory of still images as a stream.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, warn};
use watchpost_core::{Frame, FrameSource, TimedFrame, Timestamp};

/// Supported image extensions.
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "tif", "tiff"];

/// Frame source over the image files of one directory.
///
/// Files are played in file-name order at a fixed rate: frame `i` is stamped
/// `i / fps` seconds after the start of the run. The first frame that loads
/// fixes the frame size; later frames of another size are rejected.
pub struct DirFrameSource {
    files: Vec<PathBuf>,
    fps: f64,
    started_at: OffsetDateTime,
    frame_size: Option<(u32, u32)>,
}

impl DirFrameSource {
    /// Scans `dir` for frames.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be read or `fps` is not a positive
    /// number.
    pub fn new(dir: &Path, fps: f64) -> Result<Self> {
        ensure!(
            fps.is_finite() && fps > 0.0,
            "fps must be a positive number, got {fps}"
        );
        if !dir.is_dir() {
            bail!("Frame directory does not exist: {}", dir.display());
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_supported_frame(path))
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        debug!(dir = %dir.display(), frames = files.len(), "scanned frame directory");

        Ok(Self {
            files,
            fps,
            started_at: OffsetDateTime::now_utc(),
            frame_size: None,
        })
    }

    /// Pins the wall-clock time of frame zero.
    #[must_use]
    pub const fn starting_at(mut self, started_at: OffsetDateTime) -> Self {
        self.started_at = started_at;
        self
    }

    /// Keeps only the first `max` frames.
    #[must_use]
    pub fn limit(mut self, max: usize) -> Self {
        self.files.truncate(max);
        self
    }

    /// Files that will be played, in order.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn timestamp(&self, index: usize) -> Timestamp {
        #[allow(clippy::cast_precision_loss)]
        let offset = Duration::from_secs_f64(index as f64 / self.fps);
        let ts = Timestamp::at(offset);
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        match (self.started_at + offset).format(format) {
            Ok(wall) => ts.with_wall_clock(wall),
            Err(e) => {
                warn!("Failed to format wall-clock time: {e}");
                ts
            }
        }
    }
}

impl FrameSource for DirFrameSource {
    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<TimedFrame>> + Send + '_> {
        let files = self.files.clone();
        Box::new(files.into_iter().enumerate().map(move |(index, path)| {
            let image = load_frame(&path)?;
            let size = image.dimensions();
            match self.frame_size {
                Some(expected) if expected != size => bail!(
                    "{}: frame is {}x{}, expected {}x{}",
                    path.display(),
                    size.0,
                    size.1,
                    expected.0,
                    expected.1
                ),
                Some(_) => {}
                None => self.frame_size = Some(size),
            }
            Ok(TimedFrame {
                frame: Frame::new(index as u64, image),
                timestamp: self.timestamp(index),
            })
        }))
    }

    fn count_hint(&self) -> Option<usize> {
        Some(self.files.len())
    }
}

/// Checks if a path has a supported image extension.
fn is_supported_frame(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.as_str()))
}

/// Loads a frame as 8-bit RGB.
fn load_frame(path: &Path) -> Result<image::RgbImage> {
    let image =
        image::open(path).with_context(|| format!("Failed to open frame: {}", path.display()))?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported_frame() {
        assert!(is_supported_frame(Path::new("0001.png")));
        assert!(is_supported_frame(Path::new("0001.JPG")));
        assert!(is_supported_frame(Path::new("cam/0001.tiff")));
        assert!(!is_supported_frame(Path::new("notes.txt")));
        assert!(!is_supported_frame(Path::new("0001.gif")));
        assert!(!is_supported_frame(Path::new("0001")));
    }

    #[test]
    fn test_rejects_bad_fps() {
        let dir = std::env::temp_dir();
        assert!(DirFrameSource::new(&dir, 0.0).is_err());
        assert!(DirFrameSource::new(&dir, f64::NAN).is_err());
    }

    #[test]
    fn test_missing_directory() {
        let err = DirFrameSource::new(Path::new("/definitely/not/here"), 1.0);
        assert!(err.is_err_and(|e| e.to_string().contains("does not exist")));
    }
}

//! Integration tests for replaying a directory of frames.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use time::macros::datetime;
use watchpost_adapters::DirFrameSource;
use watchpost_core::FrameSource;
use watchpost_test_support::SyntheticFrameBuilder;

#[test]
fn test_frames_in_name_order_with_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let images = vec![
        SyntheticFrameBuilder::uniform(8, 8, 10),
        SyntheticFrameBuilder::uniform(8, 8, 20),
        SyntheticFrameBuilder::uniform(8, 8, 30),
    ];
    SyntheticFrameBuilder::write_png_sequence(dir.path(), &images).unwrap();
    std::fs::write(dir.path().join("README.txt"), "not a frame").unwrap();

    let mut source = DirFrameSource::new(dir.path(), 2.0)
        .unwrap()
        .starting_at(datetime!(2024-01-01 00:00:00 UTC));
    assert_eq!(source.count_hint(), Some(3));

    let frames: Vec<_> = source.frames().map(|f| f.expect("frame loads")).collect();
    assert_eq!(frames.len(), 3);

    for (i, timed) in frames.iter().enumerate() {
        assert_eq!(timed.frame.index, i as u64);
        assert_eq!(timed.frame.width(), 8);
        assert_eq!(timed.frame.image.get_pixel(0, 0).0[0], images[i].get_pixel(0, 0).0[0]);
    }
    assert_eq!(frames[1].timestamp.elapsed, Duration::from_millis(500));
    assert_eq!(frames[2].timestamp.elapsed, Duration::from_secs(1));
    assert_eq!(
        frames[2].timestamp.wall_clock.as_deref(),
        Some("2024-01-01 00:00:01")
    );
}

#[test]
fn test_mismatched_frame_size_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let images = vec![
        SyntheticFrameBuilder::uniform(8, 8, 0),
        SyntheticFrameBuilder::uniform(4, 4, 0),
        SyntheticFrameBuilder::uniform(8, 8, 0),
    ];
    SyntheticFrameBuilder::write_png_sequence(dir.path(), &images).unwrap();

    let mut source = DirFrameSource::new(dir.path(), 1.0).unwrap();
    let items: Vec<_> = source.frames().collect();

    assert!(items[0].is_ok());
    let err = items[1].as_ref().unwrap_err().to_string();
    assert!(err.contains("4x4"), "{err}");
    assert!(err.contains("expected 8x8"), "{err}");
    assert_eq!(items[2].as_ref().unwrap().frame.index, 2);
}

#[test]
fn test_corrupt_file_is_an_item_error() {
    let dir = tempfile::tempdir().unwrap();
    SyntheticFrameBuilder::write_png_sequence(dir.path(), &[SyntheticFrameBuilder::uniform(4, 4, 0)])
        .unwrap();
    std::fs::write(dir.path().join("frame_0001.png"), b"not really a png").unwrap();

    let mut source = DirFrameSource::new(dir.path(), 1.0).unwrap();
    let items: Vec<_> = source.frames().collect();
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(items[1].is_err());
}

#[test]
fn test_limit() {
    let dir = tempfile::tempdir().unwrap();
    SyntheticFrameBuilder::write_png_sequence(dir.path(), &SyntheticFrameBuilder::still_sequence(5, 4, 4))
        .unwrap();

    let mut source = DirFrameSource::new(dir.path(), 1.0).unwrap().limit(2);
    assert_eq!(source.files().len(), 2);
    assert_eq!(source.frames().count(), 2);
}

#[test]
fn test_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = DirFrameSource::new(dir.path(), 25.0).unwrap();
    assert_eq!(source.count_hint(), Some(0));
    assert_eq!(source.frames().count(), 0);
}

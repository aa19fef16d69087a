mod common;

use std::{sync::mpsc, time::Duration};

use color_eyre::eyre;
use common::{cargo_tmpdir, create_test_video, saved_indices};
use framesift::{
    config::ExtractionConfig,
    frame_source::{FrameSource, VideoSource},
    session::ExtractionSession,
};

const TEST_VIDEO_FRAMES: u64 = 250;
const TEST_VIDEO_FPS: f64 = 25.0;

#[test]
fn test_metadata() -> eyre::Result<()> {
    let video = create_test_video();
    let source = VideoSource::open(&video)?;
    let meta = source.metadata();
    assert_eq!(TEST_VIDEO_FPS, meta.fps);
    assert!(meta.total_frames.abs_diff(TEST_VIDEO_FRAMES) <= 1);
    assert!((meta.duration_seconds - 10.0).abs() < 0.1);
    Ok(())
}

#[test]
fn test_total_frames() -> eyre::Result<()> {
    let video = create_test_video();
    let mut source = VideoSource::open(&video)?;

    let mut count = 0;
    while let Some(frame) = source.next_frame() {
        assert_eq!(count, frame.index);
        assert_eq!((320, 240), frame.pixels.dimensions());
        count += 1;
    }
    assert_eq!(TEST_VIDEO_FRAMES, count);
    assert!(source.next_frame().is_none());
    Ok(())
}

#[test]
fn test_missing_file() {
    let missing = cargo_tmpdir().join("framesift-no-such-video.mkv");
    assert!(VideoSource::open(missing).is_err());
}

#[test]
fn test_not_a_video() {
    let file = cargo_tmpdir().join("framesift-not-a-video.mkv");
    std::fs::write(&file, b"definitely not a video").unwrap();
    assert!(VideoSource::open(&file).is_err());
}

#[test]
fn test_session_on_a_video() {
    let video = create_test_video();
    let outdir = tempfile::tempdir_in(cargo_tmpdir()).unwrap();
    let mut config = ExtractionConfig::new(outdir.path());
    config.force_sampling = true;
    config.sample_interval_seconds = 1.0;

    let (tx, rx) = mpsc::channel();
    let mut session = ExtractionSession::new();
    session
        .start(&video, config, |_| {}, move |done| tx.send(done).unwrap())
        .unwrap();
    let done = rx.recv_timeout(Duration::from_secs(120)).unwrap();
    session.wait();

    assert!(done.success, "{}", done.message);
    assert!(done.message.contains("/250 frames extracted"), "{}", done.message);

    let saved = saved_indices(outdir.path());
    for second in 0..10 {
        assert!(saved.contains(&(second * 25)), "{second}");
    }
}

#[test]
fn test_session_missing_video() {
    let outdir = tempfile::tempdir_in(cargo_tmpdir()).unwrap();
    let (tx, rx) = mpsc::channel();
    let mut session = ExtractionSession::new();
    session
        .start(
            cargo_tmpdir().join("framesift-no-such-video.mkv"),
            ExtractionConfig::new(outdir.path()),
            |_| {},
            move |done| tx.send(done).unwrap(),
        )
        .unwrap();
    session.wait();

    let done = rx.recv().unwrap();
    assert!(!done.success);
    assert!(done.message.contains("No such file"), "{}", done.message);
    assert!(saved_indices(outdir.path()).is_empty());
}

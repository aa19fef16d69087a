// NOTE: every test will complain about the functions it doesn't use
#![allow(unused)]

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::mpsc,
    time::Duration,
};

use color_eyre::eyre;
use framesift::{
    config::ExtractionConfig,
    frame_source::{FrameRecord, FrameSource, VideoMetadata},
    output_namer,
    session::{CompletionEvent, ExtractionSession, ProgressEvent},
};
use image::{Rgb, RgbImage};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

/// Returns cargo's tmpdir
pub fn cargo_tmpdir() -> PathBuf {
    PathBuf::from(option_env!("CARGO_TARGET_TMPDIR").expect("no cargo tmpdir???"))
}

/// Frames from memory.
pub struct VecSource {
    frames: std::vec::IntoIter<RgbImage>,
    metadata: VideoMetadata,
    next_index: u64,
}

impl VecSource {
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        Self {
            metadata: VideoMetadata::new(frames.len() as u64, fps),
            frames: frames.into_iter(),
            next_index: 0,
        }
    }

    /// Claims to have `total_frames` frames, but only has `frames`, like a truncated
    /// video.
    pub fn truncated(frames: Vec<RgbImage>, fps: f64, total_frames: u64) -> Self {
        Self {
            metadata: VideoMetadata::new(total_frames, fps),
            ..Self::new(frames, fps)
        }
    }
}

impl FrameSource for VecSource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn next_frame(&mut self) -> Option<FrameRecord> {
        let img = self.frames.next()?;
        let record = FrameRecord::new(self.next_index, self.metadata.fps, img);
        self.next_index += 1;
        Some(record)
    }
}

pub fn black() -> RgbImage {
    RgbImage::new(WIDTH, HEIGHT)
}

/// A black frame with a white square in it.
pub fn with_square(x0: u32, y0: u32, size: u32) -> RgbImage {
    let mut img = black();
    for y in y0..y0 + size {
        for x in x0..x0 + size {
            img.put_pixel(x, y, Rgb([255, 255, 255]));
        }
    }
    img
}

pub fn config(outdir: &Path) -> ExtractionConfig {
    let mut config = ExtractionConfig::new(outdir);
    config.min_area_threshold = 100.0;
    config.output_format = framesift::config::OutputFormat::Png;
    config
}

pub struct Run {
    pub progress: Vec<ProgressEvent>,
    pub completion: CompletionEvent,
}

/// Runs a session over `source` until it completes.
pub fn run(session: &mut ExtractionSession, source: VecSource, config: ExtractionConfig) -> Run {
    run_with(session, source, config, |_| {})
}

pub fn run_with(
    session: &mut ExtractionSession,
    source: VecSource,
    config: ExtractionConfig,
    mut on_progress: impl FnMut(&ProgressEvent) + Send + 'static,
) -> Run {
    let (progress_tx, progress_rx) = mpsc::channel();
    let (done_tx, done_rx) = mpsc::channel();
    session
        .start_with(
            move || -> eyre::Result<VecSource> { Ok(source) },
            config,
            move |progress| {
                on_progress(&progress);
                progress_tx.send(progress).unwrap();
            },
            move |completion| done_tx.send(completion).unwrap(),
        )
        .expect("failed to start");

    let completion = done_rx
        .recv_timeout(Duration::from_secs(60))
        .expect("no completion");
    session.wait();

    Run {
        progress: progress_rx.try_iter().collect(),
        completion,
    }
}

/// The indices of the frames in `dir`, in name order.
pub fn saved_indices(dir: &Path) -> Vec<u64> {
    let mut indices: Vec<u64> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .map(|name| {
            output_namer::parse(name.to_str().unwrap())
                .expect("only frames in the output")
                .0
        })
        .collect();
    indices.sort();
    indices
}

/// Creates a 10 second, 25 fps test video with ffmpeg, once.
pub fn create_test_video() -> PathBuf {
    let tmpvideo = cargo_tmpdir().join("framesift-testvideo.mkv");

    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::fs::remove_file(&tmpvideo).ok();
        std::process::Command::new("ffmpeg")
            .args([
                "-f",
                "lavfi",
                "-i",
                "testsrc=duration=10:rate=25:size=320x240",
                tmpvideo.as_os_str().to_str().expect("no probs, probably"),
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .status()
            .expect("failed to execute ffmpeg");
    });

    tmpvideo
}

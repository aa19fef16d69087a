pub mod video;

use std::cell::OnceCell;

use image::{GrayImage, RgbImage};

pub use video::VideoSource;

/// Something that produces frames in order, once. Reading errors are not
/// distinguishable from the end of the stream, both simply end it.
pub trait FrameSource {
    fn metadata(&self) -> VideoMetadata;

    /// The next frame, or `None` if there are no more frames. Keeps returning `None`
    /// once it has done so.
    fn next_frame(&mut self) -> Option<FrameRecord>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub total_frames: u64,
    pub fps: f64,
    pub duration_seconds: f64,
}

impl VideoMetadata {
    pub fn new(total_frames: u64, fps: f64) -> Self {
        Self {
            total_frames,
            fps,
            duration_seconds: frames_to_seconds(total_frames, fps),
        }
    }
}

/// How far into the video frame `index` is, or 0 if the frame rate is unknown.
pub fn frames_to_seconds(index: u64, fps: f64) -> f64 {
    if fps > 0.0 {
        index as f64 / fps
    } else {
        0.0
    }
}

pub struct FrameRecord {
    pub index: u64,
    pub timestamp_seconds: f64,
    pub pixels: RgbImage,
    processed: OnceCell<GrayImage>,
}

impl FrameRecord {
    pub fn new(index: u64, fps: f64, pixels: RgbImage) -> Self {
        Self {
            index,
            timestamp_seconds: frames_to_seconds(index, fps),
            pixels,
            processed: OnceCell::new(),
        }
    }

    /// The preprocessed version of this frame, `preprocess` only runs the first time
    /// this is called.
    pub fn processed_with(&self, preprocess: impl FnOnce(&RgbImage) -> GrayImage) -> &GrayImage {
        self.processed.get_or_init(|| preprocess(&self.pixels))
    }

    pub fn is_processed(&self) -> bool {
        self.processed.get().is_some()
    }
}

impl std::fmt::Debug for FrameRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRecord")
            .field("index", &self.index)
            .field("timestamp_seconds", &self.timestamp_seconds)
            .field("dimensions", &self.pixels.dimensions())
            .field("processed", &self.is_processed())
            .finish()
    }
}

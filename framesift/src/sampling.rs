use crate::config::ExtractionConfig;

/// Keeps every n:th frame no matter what it looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    force_sampling: bool,
    frame_interval: u64,
}

impl SamplingPolicy {
    pub fn new(force_sampling: bool, sample_interval_seconds: f64, fps: f64) -> Self {
        Self {
            force_sampling,
            frame_interval: frame_interval(fps, sample_interval_seconds),
        }
    }

    pub fn from_config(config: &ExtractionConfig, fps: f64) -> Self {
        Self::new(config.force_sampling, config.sample_interval_seconds, fps)
    }

    pub fn frame_interval(&self) -> u64 {
        self.frame_interval
    }

    pub fn forced(&self, index: u64) -> bool {
        self.force_sampling && index % self.frame_interval == 0
    }
}

/// How many frames `sample_interval_seconds` is, at least one.
pub fn frame_interval(fps: f64, sample_interval_seconds: f64) -> u64 {
    if sample_interval_seconds > 0.0 {
        let frames = (fps * sample_interval_seconds).floor();
        if frames.is_finite() && frames >= 1.0 {
            return frames as u64;
        }
    }
    1
}

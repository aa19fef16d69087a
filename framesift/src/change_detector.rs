//! Decides whether a frame differs enough from the one before it to be worth keeping.
//!
//! Both frames are turned gray and blurred, to get rid of sensor noise and small things
//! like a moving mouse cursor, and then compared twice: globally with SSIM and locally
//! by looking for a large enough connected region of changed pixels. A frame is only
//! kept if both comparisons agree that something happened.

use framesift_common::utils::{
    imgutils::{abs_diff, gaussian_blur, grayscale, maskify, white_region_areas},
    ssim::mean_ssim,
};
use image::{GrayImage, RgbImage};

use crate::{config::ExtractionConfig, frame_source::FrameRecord};

/// Pixels whose gray levels differ by more than this count as changed.
pub const PIXEL_DIFF_THRESHOLD: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// `1 - SSIM`
    pub dissimilarity: f64,
    /// Whether a changed region is larger than the minimum area.
    pub significant: bool,
}

#[derive(Debug, Clone)]
pub struct ChangeDetector {
    diff_threshold: f64,
    min_area_threshold: f64,
    blur_kernel_size: u32,
}

impl ChangeDetector {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            diff_threshold: config.diff_threshold,
            min_area_threshold: config.min_area_threshold,
            blur_kernel_size: config.blur_kernel_size,
        }
    }

    pub fn preprocess(&self, frame: &RgbImage) -> GrayImage {
        gaussian_blur(&grayscale(frame), self.blur_kernel_size)
    }

    pub fn score(&self, prev: &GrayImage, curr: &GrayImage) -> Score {
        if prev.dimensions() != curr.dimensions() {
            log::warn!(
                "Frame dimensions changed from {:?} to {:?}",
                prev.dimensions(),
                curr.dimensions()
            );
            return Score {
                dissimilarity: 1.0,
                significant: true,
            };
        }

        let dissimilarity = 1.0 - mean_ssim(prev, curr);
        let mask = maskify(abs_diff(prev, curr), PIXEL_DIFF_THRESHOLD);
        let significant = white_region_areas(&mask)
            .into_iter()
            .any(|area| area as f64 > self.min_area_threshold);

        Score {
            dissimilarity,
            significant,
        }
    }

    pub fn decide(&self, score: Score) -> bool {
        decide(score.dissimilarity, score.significant, self.diff_threshold)
    }

    /// Compares `curr` to `prev`, preprocessing them both if they haven't been already.
    pub fn score_frames(&self, prev: &FrameRecord, curr: &FrameRecord) -> Score {
        let prev = prev.processed_with(|img| self.preprocess(img));
        let curr = curr.processed_with(|img| self.preprocess(img));
        self.score(prev, curr)
    }

    pub fn has_changed(&self, prev: &FrameRecord, curr: &FrameRecord) -> bool {
        let score = self.score_frames(prev, curr);
        let retain = self.decide(score);
        log::trace!(
            "Frame {}: dissimilarity {:.4}, significant {}, retain {}",
            curr.index,
            score.dissimilarity,
            score.significant,
            retain
        );
        retain
    }
}

/// Strictly more dissimilar than the threshold, and the change covers a large enough
/// area.
pub fn decide(dissimilarity: f64, significant: bool, diff_threshold: f64) -> bool {
    dissimilarity > diff_threshold && significant
}

#[cfg(test)]
mod test {
    use super::*;
    use framesift_common::utils::imgutils::filled;
    use image::Rgb;

    fn detector(min_area: f64, blur: u32) -> ChangeDetector {
        let mut config = ExtractionConfig::new("unused");
        config.min_area_threshold = min_area;
        config.blur_kernel_size = blur;
        ChangeDetector::new(&config)
    }

    fn with_rect(base: &RgbImage, x0: u32, y0: u32, size: u32) -> RgbImage {
        let mut img = base.clone();
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        img
    }

    #[test]
    fn decide_is_strict() {
        assert!(!decide(0.1, true, 0.1));
        assert!(decide(0.10001, true, 0.1));
        assert!(!decide(0.9, false, 0.1));
    }

    #[test]
    fn identical_frames() {
        let det = detector(10.0, 5);
        let img = det.preprocess(&filled(32, 32, 40, 90, 200));
        let score = det.score(&img, &img);
        assert_eq!(0.0, score.dissimilarity);
        assert!(!score.significant);
        assert!(!det.decide(score));
    }

    #[test]
    fn large_change_is_retained() {
        let det = detector(100.0, 5);
        let base = filled(64, 48, 0, 0, 0);
        let prev = det.preprocess(&base);
        let curr = det.preprocess(&with_rect(&base, 10, 10, 20));
        let score = det.score(&prev, &curr);
        assert!(score.significant);
        assert!(score.dissimilarity > 0.05);
        assert!(det.decide(score));
    }

    #[test]
    fn cursor_sized_change_is_not_significant() {
        let det = detector(100.0, 5);
        let base = filled(64, 48, 0, 0, 0);
        let prev = det.preprocess(&base);
        let curr = det.preprocess(&with_rect(&base, 30, 20, 3));
        let score = det.score(&prev, &curr);
        assert!(!score.significant);
        assert!(!det.decide(score));
    }

    #[test]
    fn sensor_noise_is_ignored() {
        use rand::{rngs::SmallRng, Rng, SeedableRng};

        let mut rng = SmallRng::seed_from_u64(42);
        let base = filled(64, 48, 120, 120, 120);
        let mut noisy = base.clone();
        noisy.pixels_mut().for_each(|p| {
            p.0.iter_mut()
                .for_each(|c| *c = c.saturating_add_signed(rng.gen_range(-8..=8)))
        });

        let det = detector(10.0, 5);
        let score = det.score(&det.preprocess(&base), &det.preprocess(&noisy));
        assert!(!score.significant);
        assert!(!det.decide(score));
    }

    #[test]
    fn different_dimensions() {
        let det = detector(0.0, 1);
        let a = GrayImage::new(4, 4);
        let b = GrayImage::new(5, 4);
        let score = det.score(&a, &b);
        assert_eq!(1.0, score.dissimilarity);
        assert!(score.significant);
    }

    #[test]
    fn frames_are_preprocessed_lazily() {
        let det = detector(100.0, 3);
        let a = FrameRecord::new(0, 10.0, filled(16, 16, 1, 2, 3));
        let b = FrameRecord::new(1, 10.0, filled(16, 16, 1, 2, 3));
        assert!(!a.is_processed());
        assert!(!det.has_changed(&a, &b));
        assert!(a.is_processed());
        assert!(b.is_processed());
    }
}

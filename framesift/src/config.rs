use std::{fmt, path::PathBuf, str::FromStr};

use image::ImageFormat;

/// Everything that decides which frames are kept and how they are written. Given to
/// [`crate::session::ExtractionSession::start`] and never changed during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    /// How dissimilar, `1 - SSIM`, two consecutive frames must be. In `(0, 1]`.
    pub diff_threshold: f64,
    /// How many pixels, at least, a changed region must cover.
    pub min_area_threshold: f64,
    /// Size of the Gaussian blur applied before comparing. Odd.
    pub blur_kernel_size: u32,
    /// How often frames are kept regardless of their content, if `force_sampling`.
    pub sample_interval_seconds: f64,
    pub force_sampling: bool,
    pub resize_to: Option<ResizeSpec>,
    pub output_format: OutputFormat,
    pub output_directory: PathBuf,
}

impl ExtractionConfig {
    pub const DEFAULT_DIFF_THRESHOLD: f64 = 0.05;
    pub const DEFAULT_MIN_AREA_THRESHOLD: f64 = 500.0;
    pub const DEFAULT_BLUR_KERNEL_SIZE: u32 = 5;
    pub const DEFAULT_SAMPLE_INTERVAL_SECONDS: f64 = 1.0;

    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            diff_threshold: Self::DEFAULT_DIFF_THRESHOLD,
            min_area_threshold: Self::DEFAULT_MIN_AREA_THRESHOLD,
            blur_kernel_size: Self::DEFAULT_BLUR_KERNEL_SIZE,
            sample_interval_seconds: Self::DEFAULT_SAMPLE_INTERVAL_SECONDS,
            force_sampling: false,
            resize_to: None,
            output_format: OutputFormat::Jpg,
            output_directory: output_directory.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Self {
            diff_threshold,
            min_area_threshold,
            blur_kernel_size,
            sample_interval_seconds,
            resize_to,
            ..
        } = *self;

        if !(diff_threshold.is_finite() && diff_threshold > 0.0 && diff_threshold <= 1.0) {
            return Err(ConfigError::DiffThreshold(diff_threshold));
        }
        if !(min_area_threshold.is_finite() && min_area_threshold >= 0.0) {
            return Err(ConfigError::MinAreaThreshold(min_area_threshold));
        }
        if blur_kernel_size == 0 || blur_kernel_size % 2 == 0 {
            return Err(ConfigError::BlurKernelSize(blur_kernel_size));
        }
        if !(sample_interval_seconds.is_finite() && sample_interval_seconds >= 0.0) {
            return Err(ConfigError::SampleInterval(sample_interval_seconds));
        }
        if let Some(resize) = resize_to {
            if resize.width == 0 || resize.height == 0 {
                return Err(ConfigError::ResizeTo(resize));
            }
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("the diff threshold must be in (0, 1], got {0}")]
    DiffThreshold(f64),
    #[error("the minimum area threshold must be at least 0, got {0}")]
    MinAreaThreshold(f64),
    #[error("the blur kernel size must be odd and at least 1, got {0}")]
    BlurKernelSize(u32),
    #[error("the sample interval must be at least 0 seconds, got {0}")]
    SampleInterval(f64),
    #[error("can't resize to {0}, both sides must be non-zero")]
    ResizeTo(ResizeSpec),
}

/// Stretch every written frame to exactly this size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSpec {
    pub width: u32,
    pub height: u32,
}

#[derive(thiserror::Error, Debug)]
#[error("expected a size like 1280x720")]
pub struct ResizeSpecError;

impl FromStr for ResizeSpec {
    type Err = ResizeSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s.split_once(['x', 'X']).ok_or(ResizeSpecError)?;
        let width = width.trim().parse().map_err(|_| ResizeSpecError)?;
        let height = height.trim().parse().map_err(|_| ResizeSpecError)?;
        Ok(Self { width, height })
    }
}

impl fmt::Display for ResizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpg,
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Jpg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpg),
            "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown output format, expected jpg or png")]
pub struct OutputFormatError;

impl FromStr for OutputFormat {
    type Err = OutputFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or(OutputFormatError)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> ExtractionConfig {
        ExtractionConfig::new("out")
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(Ok(()), config().validate());
    }

    #[test]
    fn diff_threshold_bounds() {
        let mut conf = config();
        conf.diff_threshold = 1.0;
        assert!(conf.validate().is_ok());

        for bad in [0.0, -0.1, 1.01, f64::NAN, f64::INFINITY] {
            conf.diff_threshold = bad;
            assert!(matches!(conf.validate(), Err(ConfigError::DiffThreshold(_))));
        }
    }

    #[test]
    fn blur_must_be_odd() {
        let mut conf = config();
        conf.blur_kernel_size = 1;
        assert!(conf.validate().is_ok());

        conf.blur_kernel_size = 4;
        assert_eq!(Err(ConfigError::BlurKernelSize(4)), conf.validate());

        conf.blur_kernel_size = 0;
        assert_eq!(Err(ConfigError::BlurKernelSize(0)), conf.validate());
    }

    #[test]
    fn negative_values() {
        let mut conf = config();
        conf.min_area_threshold = -1.0;
        assert_eq!(Err(ConfigError::MinAreaThreshold(-1.0)), conf.validate());

        let mut conf = config();
        conf.sample_interval_seconds = -1.0;
        assert_eq!(Err(ConfigError::SampleInterval(-1.0)), conf.validate());

        let mut conf = config();
        conf.sample_interval_seconds = 0.0;
        conf.min_area_threshold = 0.0;
        assert!(conf.validate().is_ok());
    }

    #[test]
    fn zero_sized_resize() {
        let mut conf = config();
        conf.resize_to = Some(ResizeSpec {
            width: 0,
            height: 10,
        });
        assert!(matches!(conf.validate(), Err(ConfigError::ResizeTo(_))));
    }

    #[test]
    fn parse_resize() {
        assert_eq!(
            ResizeSpec {
                width: 1280,
                height: 720
            },
            "1280x720".parse().unwrap()
        );
        assert!("1280".parse::<ResizeSpec>().is_err());
        assert!("ax720".parse::<ResizeSpec>().is_err());
    }

    #[test]
    fn parse_format() {
        assert_eq!(OutputFormat::Jpg, "jpeg".parse().unwrap());
        assert_eq!(OutputFormat::Png, "PNG".parse().unwrap());
        assert!("gif".parse::<OutputFormat>().is_err());
        assert_eq!("png", OutputFormat::Png.to_string());
    }
}

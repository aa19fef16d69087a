use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use framesift_common::utils::{fsutils, imgutils};
use image::{
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
    ColorType, ImageEncoder, RgbImage,
};

use crate::config::{OutputFormat, ResizeSpec};

pub const JPEG_QUALITY: u8 = 95;

#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// One way of turning an image into a file.
pub trait Encoder: Send + Sync {
    fn name(&self) -> &'static str;
    fn encode(&self, img: &RgbImage, path: &Path, format: OutputFormat)
        -> Result<(), EncodeError>;
}

/// Lets the image crate pick the encoder from the format and write to the file
/// directly.
pub struct SaveEncoder;

impl Encoder for SaveEncoder {
    fn name(&self) -> &'static str {
        "save"
    }

    fn encode(
        &self,
        img: &RgbImage,
        path: &Path,
        format: OutputFormat,
    ) -> Result<(), EncodeError> {
        img.save_with_format(path, format.image_format())?;
        Ok(())
    }
}

/// Encodes into memory with explicitly configured encoders, then writes the bytes next
/// to the destination and renames them into place.
pub struct BufferedEncoder;

impl Encoder for BufferedEncoder {
    fn name(&self) -> &'static str {
        "buffered"
    }

    fn encode(
        &self,
        img: &RgbImage,
        path: &Path,
        format: OutputFormat,
    ) -> Result<(), EncodeError> {
        let mut buffer = Vec::new();
        match format {
            OutputFormat::Jpg => {
                JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).write_image(
                    img.as_raw(),
                    img.width(),
                    img.height(),
                    ColorType::Rgb8,
                )?
            }
            OutputFormat::Png => PngEncoder::new(&mut buffer).write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                ColorType::Rgb8,
            )?,
        }
        fsutils::write_atomic(path, &buffer)?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub struct WriteError {
    pub path: PathBuf,
    /// The name of each tried encoder and why it failed.
    pub failures: Vec<(&'static str, EncodeError)>,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to write {}", self.path.display())?;
        if self.failures.is_empty() {
            return write!(f, ", there are no encoders");
        }
        for (name, error) in &self.failures {
            write!(f, "; {name}: {error}")?;
        }
        Ok(())
    }
}

/// Writes frames, trying each encoder in turn until one of them succeeds.
pub struct FrameWriter {
    encoders: Vec<Box<dyn Encoder>>,
}

impl FrameWriter {
    pub fn new(encoders: Vec<Box<dyn Encoder>>) -> Self {
        Self { encoders }
    }

    pub fn encoder_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.encoders.iter().map(|enc| enc.name())
    }

    pub fn write(
        &self,
        pixels: &RgbImage,
        path: &Path,
        resize: Option<ResizeSpec>,
        format: OutputFormat,
    ) -> Result<(), WriteError> {
        let resized;
        let img = match resize {
            Some(ResizeSpec { width, height }) if (width, height) != pixels.dimensions() => {
                resized = imgutils::stretch(pixels, width, height);
                &resized
            }
            _ => pixels,
        };

        let mut failures = Vec::new();
        for encoder in &self.encoders {
            match encoder.encode(img, path, format) {
                Ok(()) => {
                    if !failures.is_empty() {
                        log::debug!(
                            "Wrote {} with the {} encoder after {} failures",
                            path.display(),
                            encoder.name(),
                            failures.len()
                        );
                    }
                    return Ok(());
                }
                Err(e) => {
                    log::debug!(
                        "The {} encoder failed on {}: {}",
                        encoder.name(),
                        path.display(),
                        e
                    );
                    failures.push((encoder.name(), e));
                }
            }
        }

        // an encoder might have left a truncated image behind
        fs::remove_file(path).ok();
        Err(WriteError {
            path: path.to_owned(),
            failures,
        })
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new(vec![Box::new(SaveEncoder), Box::new(BufferedEncoder)])
    }
}

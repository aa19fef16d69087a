extern crate ffmpeg_next as ffmpeg;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use color_eyre::eyre::{self, Context};
use ffmpeg::codec::Context as CodecContext;
use ffmpeg::decoder::Video as DecoderVideo;
use ffmpeg::format::context::Input as FormatContext;
use ffmpeg::format::{input, Pixel};
use ffmpeg::frame::Video as FrameVideo;
use ffmpeg::media::Type;
use ffmpeg::software::scaling::context::Context as ScalingContext;
use ffmpeg::util::log as ffmpeglog;
use ffmpeg::{Packet as CodecPacket, Rational, Rescale};
use ffmpeg_sys_next::{AV_NOPTS_VALUE, AV_TIME_BASE_Q};
use image::RgbImage;

use super::{FrameRecord, FrameSource, VideoMetadata};

pub type Result<T> = eyre::Result<T>;

static FFMPEG_INITIALIZED: OnceLock<std::result::Result<(), ffmpeg::Error>> =
    OnceLock::new();

/// Decodes the best video stream of a file, from the start to the end, as RGB images.
pub struct VideoSource {
    path: PathBuf,

    // ffmpeg contexts
    ictx: FormatContext,
    decoder: DecoderVideo,
    converter: ScalingContext,
    video_stream_index: usize,

    metadata: VideoMetadata,
    orientation: Orientation,
    next_index: u64,
    done: bool,
}

impl VideoSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Err(e) = FFMPEG_INITIALIZED.get_or_init(|| {
            ffmpeg::init()?;
            ffmpeglog::set_level(ffmpeglog::Level::Fatal);
            Ok(())
        }) {
            return Err(e.clone()).wrap_err("Failed to initialize ffmpeg");
        }

        let path = path.as_ref();
        eyre::ensure!(path.is_file(), "No such file: {}", path.display());

        let mut ictx = input(&path).wrap_err("Failed to open the file")?;

        let video = ictx
            .streams()
            .best(Type::Video)
            .ok_or(eyre::eyre!("No video stream"))?;
        let video_stream_index = video.index();

        let fps = [video.avg_frame_rate(), video.rate()]
            .into_iter()
            .find_map(rational_to_fps)
            .unwrap_or(0.0);

        let total_frames = match video.frames() {
            frames if frames > 0 => frames as u64,
            _ => estimate_frames(&ictx, &video, fps),
        };

        let orientation = match get_orientation(&video) {
            Some(x) => x,
            None => {
                log::warn!(
                    "Got a weird orientation angle, ignoring ({})",
                    path.display()
                );
                Orientation::Normal
            }
        };

        let decoder = CodecContext::from_parameters(video.parameters())
            .wrap_err("No codec found")?
            .decoder()
            .video()
            .wrap_err("No codec found, of type video (?)")?;

        let converter = pixel_converter(&decoder)?;

        ictx.streams_mut()
            .filter(|stream| stream.index() != video_stream_index)
            .for_each(|mut stream| stream_set_discard_all(&mut stream));

        Ok(Self {
            path: path.to_owned(),
            ictx,
            decoder,
            converter,
            video_stream_index,
            metadata: VideoMetadata::new(total_frames, fps),
            orientation,
            next_index: 0,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The next decoded image, `Ok(None)` at the end of the stream.
    pub fn next_image(&mut self) -> Result<Option<RgbImage>> {
        loop {
            let mut frame = FrameVideo::empty();
            // https://ffmpeg.org/doxygen/trunk/group__lavc__decoding.html#ga11e6542c4e66d3028668788a1a74217c
            match self.decoder.receive_frame(&mut frame) {
                Ok(()) => {
                    let mut converted = FrameVideo::empty();
                    self.converter
                        .run(&frame, &mut converted)
                        .wrap_err("Failed to convert the decoded frame")?;
                    let img = create_rust_image(converted);
                    return Ok(Some(undo_rotation(img, self.orientation)));
                }
                Err(ffmpeg::Error::Other {
                    errno: libc::EAGAIN,
                }) => (),
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(e) => {
                    return Err(e).wrap_err("Decoder error when receiving a frame from it");
                }
            }

            self.feed_decoder()?;
        }
    }

    /// Sends the next packet of the video stream to the decoder, or EOF if there are no
    /// more.
    fn feed_decoder(&mut self) -> Result<()> {
        loop {
            // http://ffmpeg.org/doxygen/trunk/group__lavf__decoding.html#ga4fdb3084415a82e3810de6ee60e46a61
            let mut packet = CodecPacket::empty();
            match packet.read(&mut self.ictx) {
                Ok(()) if packet.stream() == self.video_stream_index => {
                    match self.decoder.send_packet(&packet) {
                        Ok(()) => return Ok(()),
                        Err(e) => {
                            log::error!(
                                "Failed to decode frame: {} ({})",
                                e,
                                self.path.display()
                            );
                            continue;
                        }
                    }
                }
                Ok(()) => continue,
                Err(ffmpeg::Error::Eof) => {
                    return self
                        .decoder
                        .send_eof()
                        .wrap_err("Failed to send EOF to the decoder");
                }
                Err(e) => {
                    eyre::bail!("Failed to read a packet from the stream: {e}");
                }
            }
        }
    }
}

impl FrameSource for VideoSource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn next_frame(&mut self) -> Option<FrameRecord> {
        if self.done {
            return None;
        }

        match self.next_image() {
            Ok(Some(img)) => {
                let record = FrameRecord::new(self.next_index, self.metadata.fps, img);
                self.next_index += 1;
                Some(record)
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                log::warn!(
                    "Stopped reading {} after {} frames: {e:#}",
                    self.path.display(),
                    self.next_index
                );
                self.done = true;
                None
            }
        }
    }
}

fn rational_to_fps(rate: Rational) -> Option<f64> {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        Some(f64::from(rate))
    } else {
        None
    }
}

/// For containers that don't store the number of frames.
fn estimate_frames(ictx: &FormatContext, video: &ffmpeg::Stream, fps: f64) -> u64 {
    let duration = if video.duration() != AV_NOPTS_VALUE {
        video.duration()
    } else if ictx.duration() != AV_NOPTS_VALUE {
        ictx.duration().rescale(AV_TIME_BASE_Q, video.time_base())
    } else {
        return 0;
    };

    let seconds = duration as f64 * f64::from(video.time_base());
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * fps).round() as u64
    } else {
        0
    }
}

fn pixel_converter(decoder: &DecoderVideo) -> Result<ScalingContext> {
    eyre::ensure!(decoder.format() != Pixel::None, "No pixel format");
    Ok(ScalingContext::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        // http://git.videolan.org/?p=ffmpeg.git;a=blob;f=libavutil/pixfmt.h;hb=HEAD
        Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg::software::scaling::Flags::FAST_BILINEAR,
    )?)
}

#[derive(Clone, Copy, Debug)]
enum Orientation {
    Normal,
    Left,
    Right,
    Upside,
}

fn get_orientation(video: &ffmpeg::Stream) -> Option<Orientation> {
    for data in video.side_data() {
        if data.kind() != ffmpeg::packet::side_data::Type::DisplayMatrix {
            continue;
        }
        let rot = unsafe {
            ffmpeg_sys_next::av_display_rotation_get(data.data().as_ptr() as *const i32)
        };

        if rot.is_finite() {
            return match rot.round() as i32 {
                -90 => Some(Orientation::Right),
                90 => Some(Orientation::Left),
                0 => Some(Orientation::Normal),
                180 | -180 => Some(Orientation::Upside),
                _ => None,
            };
        }
    }

    Some(Orientation::Normal)
}

fn undo_rotation(img: RgbImage, ori: Orientation) -> RgbImage {
    match ori {
        Orientation::Normal => img,
        Orientation::Right => image::imageops::rotate90(&img),
        Orientation::Left => image::imageops::rotate270(&img),
        Orientation::Upside => image::imageops::rotate180(&img),
    }
}

/// Copies the RGB24 frame into an image, skipping the padding ffmpeg puts at the end of
/// each line.
fn create_rust_image(converted: FrameVideo) -> RgbImage {
    assert_eq!(Pixel::RGB24, converted.format());
    assert_eq!(1, converted.planes());

    let src_linesize = converted.stride(0);
    let width: usize = converted.width().try_into().expect("will always fit");
    let height: usize = converted.height().try_into().expect("will always fit");
    let data = converted.data(0);
    let trg_linesize = 3 * width;

    let data = if src_linesize == trg_linesize {
        data[..trg_linesize * height].to_vec()
    } else {
        assert!(src_linesize >= trg_linesize);
        data.chunks(src_linesize)
            .take(height)
            .flat_map(|line| &line[..trg_linesize])
            .copied()
            .collect()
    };

    RgbImage::from_vec(converted.width(), converted.height(), data)
        .expect("the buffer is big enough!")
}

fn stream_set_discard_all(stream: &mut ffmpeg::StreamMut<'_>) {
    unsafe {
        let ptr = stream.as_mut_ptr();
        if !ptr.is_null() {
            (*ptr).discard = ffmpeg_sys_next::AVDiscard::AVDISCARD_ALL;
        }
    }
}

impl fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoSource")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .field("orientation", &self.orientation)
            .field("next_index", &self.next_index)
            .field("done", &self.done)
            .finish()
    }
}

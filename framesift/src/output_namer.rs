//! File names of the extracted frames.
//!
//! A name looks like `frame_000123_00-02-05.jpg`: the index of the frame in the video,
//! how far into the video it is as `HH-MM-SS`, and the image format. Other tools sort
//! the frames chronologically by name alone, so this format must not change. They
//! first try the time, then the first number in the name, and lastly the creation time
//! of the file, see [`sort_key`].

use std::{
    fmt, io,
    path::{Path, PathBuf},
    str::FromStr,
    time::SystemTime,
};

use framesift_common::utils::fsutils;

use crate::config::OutputFormat;

const PREFIX: &str = "frame_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameName {
    pub index: u64,
    /// Whole seconds into the video.
    pub seconds: u64,
    pub format: OutputFormat,
}

impl FrameName {
    pub fn new(index: u64, timestamp_seconds: f64, format: OutputFormat) -> Self {
        let seconds = if timestamp_seconds.is_finite() && timestamp_seconds > 0.0 {
            timestamp_seconds.trunc() as u64
        } else {
            0
        };
        Self {
            index,
            seconds,
            format,
        }
    }
}

impl fmt::Display for FrameName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            index,
            seconds,
            format,
        } = self;
        write!(
            f,
            "{PREFIX}{index:06}_{:02}-{:02}-{:02}.{}",
            seconds / 3600,
            (seconds % 3600) / 60,
            seconds % 60,
            format.extension()
        )
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("not a frame name")]
pub struct FrameNameError;

impl FromStr for FrameName {
    type Err = FrameNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (stem, ext) = s.rsplit_once('.').ok_or(FrameNameError)?;
        let format = OutputFormat::from_extension(ext).ok_or(FrameNameError)?;
        let rest = stem.strip_prefix(PREFIX).ok_or(FrameNameError)?;
        let (index, time) = rest.split_once('_').ok_or(FrameNameError)?;

        if index.len() < 6 || !all_digits(index) {
            return Err(FrameNameError);
        }
        let index = index.parse().map_err(|_| FrameNameError)?;
        let seconds = parse_clock(time).ok_or(FrameNameError)?;

        Ok(Self {
            index,
            seconds,
            format,
        })
    }
}

/// The name of a kept frame.
pub fn name(index: u64, timestamp_seconds: f64, format: OutputFormat) -> String {
    FrameName::new(index, timestamp_seconds, format).to_string()
}

/// The index and whole seconds of a name created by [`name`].
pub fn parse(name: &str) -> Option<(u64, u64)> {
    name.parse::<FrameName>()
        .ok()
        .map(|frame| (frame.index, frame.seconds))
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `HH-MM-SS` to seconds. The hours can have more than two digits.
fn parse_clock(s: &str) -> Option<u64> {
    let mut parts = s.split('-');
    let (hours, minutes, seconds) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some()
        || hours.len() < 2
        || minutes.len() != 2
        || seconds.len() != 2
        || ![hours, minutes, seconds].into_iter().all(all_digits)
    {
        return None;
    }

    let hours: u64 = hours.parse().ok()?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)
}

/// What a file is ordered by, in order of preference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    /// Seconds from an `HH-MM-SS` group in the name.
    Time(u64),
    /// The first number in the name.
    Index(u64),
    Created(SystemTime),
}

/// The time group of a file name, if it has one.
pub fn time_in_name(stem: &str) -> Option<u64> {
    stem.split(|c: char| !(c.is_ascii_digit() || c == '-'))
        .flat_map(|token| token.split("--"))
        .map(|token| token.trim_matches('-'))
        .find_map(parse_clock)
}

/// The first number of a file name, if it has one.
pub fn index_in_name(stem: &str) -> Option<u64> {
    stem.split(|c: char| !c.is_ascii_digit())
        .find(|token| !token.is_empty())
        .and_then(|token| token.parse().ok())
}

/// The key to sort `path` by, only touches the file system if the name contains
/// neither a time nor a number.
pub fn sort_key(path: &Path) -> io::Result<SortKey> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    if let Some(seconds) = time_in_name(&stem) {
        return Ok(SortKey::Time(seconds));
    }
    if let Some(index) = index_in_name(&stem) {
        return Ok(SortKey::Index(index));
    }
    fsutils::created_time(path).map(SortKey::Created)
}

/// Sorts the paths chronologically. Files with the same key are ordered by name, and
/// then by their whole path, so the result doesn't depend on the order of the input.
pub fn chronological(paths: impl IntoIterator<Item = PathBuf>) -> io::Result<Vec<PathBuf>> {
    let mut keyed = paths
        .into_iter()
        .map(|path| sort_key(&path).map(|key| (key, path)))
        .collect::<io::Result<Vec<_>>>()?;

    keyed.sort_by(|(key_a, path_a), (key_b, path_b)| {
        key_a
            .cmp(key_b)
            .then_with(|| path_a.file_name().cmp(&path_b.file_name()))
            .then_with(|| path_a.cmp(path_b))
    });

    Ok(keyed.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn example_name() {
        assert_eq!(
            "frame_000123_00-02-05.jpg",
            name(123, 125.0, OutputFormat::Jpg)
        );
        assert_eq!(
            "frame_000000_00-00-00.png",
            name(0, 0.0, OutputFormat::Png)
        );
        assert_eq!(
            "frame_999999_99-59-59.png",
            name(999999, 359999.0, OutputFormat::Png)
        );
    }

    #[test]
    fn fractions_are_truncated() {
        assert_eq!(Some((7, 2)), parse(&name(7, 2.96, OutputFormat::Jpg)));
        assert_eq!(Some((7, 0)), parse(&name(7, -3.0, OutputFormat::Jpg)));
        assert_eq!(Some((7, 0)), parse(&name(7, f64::NAN, OutputFormat::Jpg)));
    }

    #[test]
    fn round_trip() {
        let format = |n: u64| {
            if n % 2 == 0 {
                OutputFormat::Jpg
            } else {
                OutputFormat::Png
            }
        };
        for t in 0..=359_999u64 {
            let i = (t * 7919) % 1_000_000;
            assert_eq!(Some((i, t)), parse(&name(i, t as f64, format(t))));
        }
        for i in 0..=999_999u64 {
            let t = (i * 997) % 360_000;
            assert_eq!(Some((i, t)), parse(&name(i, t as f64, format(i))));
        }
    }

    #[test]
    fn large_values_still_parse() {
        assert_eq!(
            Some((1_000_000, 360_000)),
            parse(&name(1_000_000, 360_000.0, OutputFormat::Png))
        );
    }

    #[test]
    fn malformed_names() {
        for bad in [
            "frame_000123_00-02-05",
            "frame_000123_00-02-05.gif",
            "frame_123_00-02-05.jpg",
            "frame_000123_00-60-05.jpg",
            "frame_000123_00-02.jpg",
            "frame_000123_0a-02-05.jpg",
            "img_000123_00-02-05.jpg",
            "",
        ] {
            assert_eq!(None, parse(bad), "{bad}");
        }
    }

    #[test]
    fn downstream_time_then_index() {
        assert_eq!(Some(125), time_in_name("frame_000123_00-02-05"));
        assert_eq!(Some(125), time_in_name("shot 00-02-05 final"));
        assert_eq!(None, time_in_name("frame_000123_00-99-05"));
        assert_eq!(None, time_in_name("frame_000123"));
        assert_eq!(Some(123), index_in_name("frame_000123"));
        assert_eq!(Some(4), index_in_name("IMG4"));
        assert_eq!(None, index_in_name("screenshot"));
    }

    #[test]
    fn sort_keys_without_files() {
        assert_eq!(
            SortKey::Time(125),
            sort_key(Path::new("/nonexistent/frame_000123_00-02-05.jpg")).unwrap()
        );
        assert_eq!(
            SortKey::Index(12),
            sort_key(Path::new("/nonexistent/frame_000012.png")).unwrap()
        );
        assert!(sort_key(Path::new("/nonexistent/cover.png")).is_err());
    }

    #[test]
    fn time_keys_come_first() {
        assert!(SortKey::Time(u64::MAX) < SortKey::Index(0));
        assert!(SortKey::Index(u64::MAX) < SortKey::Created(SystemTime::UNIX_EPOCH));
    }
}

//! Media information types.
//!
//! [`MediaInfo`] is what [`MediaProbe::probe`](crate::MediaProbe::probe)
//! returns. Every field the probe could not establish is `None`.

use std::{path::PathBuf, time::Duration};

use serde::Serialize;

/// Summary of one media file.
///
/// # Example
///
/// ```no_run
/// use segmux::MediaProbe;
///
/// let info = MediaProbe::probe("input.mp4")?;
/// println!("{} ({})", info.name, info.format);
/// if let Some(resolution) = &info.resolution {
///     println!("{resolution} @ {:?} fps", info.frame_rate);
/// }
/// # Ok::<(), segmux::SegmuxError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[must_use]
pub struct MediaInfo {
    /// File name without directories.
    pub name: String,
    /// Path the file was probed at.
    pub path: PathBuf,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
    /// Container duration.
    #[serde(serialize_with = "seconds")]
    pub duration: Option<Duration>,
    /// Frame width in pixels.
    pub width: Option<u32>,
    /// Frame height in pixels.
    pub height: Option<u32>,
    /// `"{width}x{height}"`.
    pub resolution: Option<String>,
    /// Average frames per second.
    pub frame_rate: Option<f64>,
    /// Codec name of the first video stream.
    pub video_codec: Option<String>,
    /// Codec name of the first audio stream.
    pub audio_codec: Option<String>,
    /// Container bit rate in bits per second.
    pub bit_rate: Option<u64>,
    /// Sample rate of the first audio stream, in hertz.
    pub audio_sample_rate: Option<u32>,
    /// Channel count of the first audio stream.
    pub audio_channels: Option<u16>,
    /// Size on disk in bytes.
    pub file_size: Option<u64>,
}

impl MediaInfo {
    /// Whether duration, resolution and frame rate are all known.
    pub fn is_complete(&self) -> bool {
        self.duration.is_some() && self.resolution.is_some() && self.frame_rate.is_some()
    }

    pub(crate) fn set_dimensions(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = Some(width);
        self.height = Some(height);
        self.resolution = Some(format!("{width}x{height}"));
    }
}

fn seconds<S: serde::Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_set_resolution() {
        let mut info = MediaInfo::default();
        info.set_dimensions(1920, 1080);
        assert_eq!(info.resolution.as_deref(), Some("1920x1080"));
        assert_eq!(info.width, Some(1920));
    }

    #[test]
    fn zero_dimensions_are_ignored() {
        let mut info = MediaInfo::default();
        info.set_dimensions(0, 1080);
        assert_eq!(info.resolution, None);
        assert!(!info.is_complete());
    }

    #[test]
    fn duration_serializes_as_seconds() {
        let info = MediaInfo {
            duration: Some(Duration::from_millis(2500)),
            ..MediaInfo::default()
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["duration"], serde_json::json!(2.5));
        assert_eq!(json["width"], serde_json::Value::Null);
    }
}

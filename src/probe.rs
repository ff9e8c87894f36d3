//! Lightweight media file probing.
//!
//! [`MediaProbe`] reads container and stream information without keeping
//! the demuxer open. FFmpeg is asked first; if it cannot establish the
//! duration, resolution or frame rate, the `ffprobe` tool is run and its JSON
//! report fills the gaps. A failing fallback is logged and otherwise ignored.

use std::{path::Path, time::Duration};

use ffmpeg_next::{codec::context::Context as CodecContext, media::Type};
use serde::Deserialize;

use crate::{
    conversion,
    error::SegmuxError,
    metadata::MediaInfo,
    process::{ProcessLauncher, SystemLauncher},
};

/// Media file probe.
///
/// # Example
///
/// ```no_run
/// use segmux::MediaProbe;
///
/// let info = MediaProbe::probe("input.mp4")?;
/// println!("Duration: {:?}, format: {}", info.duration, info.format);
/// # Ok::<(), segmux::SegmuxError>(())
/// ```
pub struct MediaProbe {
    launcher: Box<dyn ProcessLauncher>,
    ffprobe: String,
}

impl std::fmt::Debug for MediaProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaProbe")
            .field("ffprobe", &self.ffprobe)
            .finish_non_exhaustive()
    }
}

impl Default for MediaProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaProbe {
    /// Probe that falls back to `ffprobe` on `PATH`.
    pub fn new() -> Self {
        Self::with_launcher(Box::new(SystemLauncher::new()))
    }

    /// Probe that runs its fallback through `launcher`.
    pub fn with_launcher(launcher: Box<dyn ProcessLauncher>) -> Self {
        Self {
            launcher,
            ffprobe: "ffprobe".to_string(),
        }
    }

    /// Use a specific `ffprobe` binary for the fallback.
    #[must_use]
    pub fn with_ffprobe(mut self, program: impl Into<String>) -> Self {
        self.ffprobe = program.into();
        self
    }

    /// Probe a media file with the default settings.
    ///
    /// # Errors
    ///
    /// Returns [`SegmuxError::FileOpen`] if the file does not exist or
    /// neither FFmpeg nor `ffprobe` can read it.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<MediaInfo, SegmuxError> {
        Self::new().inspect(path)
    }

    /// Probe several files. Failures produce an `Err` entry rather than
    /// aborting the batch.
    pub fn probe_many<P: AsRef<Path>>(paths: &[P]) -> Vec<Result<MediaInfo, SegmuxError>> {
        let probe = Self::new();
        paths.iter().map(|path| probe.inspect(path)).collect()
    }

    /// Probe one file.
    ///
    /// # Errors
    ///
    /// See [`probe`](Self::probe).
    pub fn inspect<P: AsRef<Path>>(&self, path: P) -> Result<MediaInfo, SegmuxError> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::metadata(&path).map_err(|error| SegmuxError::FileOpen {
            path: path.clone(),
            reason: error.to_string(),
        })?;

        let mut info = MediaInfo {
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.clone(),
            file_size: Some(file.len()),
            ..MediaInfo::default()
        };

        let direct = inspect_with_ffmpeg(&path, &mut info);
        if let Err(error) = &direct {
            log::warn!("FFmpeg could not inspect {}: {error}", path.display());
        }

        if !info.is_complete() {
            log::debug!(
                "Incomplete information for {}, falling back to {}",
                path.display(),
                self.ffprobe,
            );
            match self.run_ffprobe(&path) {
                Ok(report) => report.fill(&mut info),
                Err(error) => {
                    log::warn!("{} fallback failed for {}: {error}", self.ffprobe, path.display());
                    direct?;
                }
            }
        }

        log::info!(
            "Probed {}: duration={:?}, resolution={}, frame_rate={:?}",
            path.display(),
            info.duration,
            info.resolution.as_deref().unwrap_or("unknown"),
            info.frame_rate,
        );

        Ok(info)
    }

    fn run_ffprobe(&self, path: &Path) -> Result<FfprobeReport, SegmuxError> {
        let args = [
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]
        .into_iter()
        .map(String::from)
        .chain(std::iter::once(path.to_string_lossy().into_owned()))
        .collect::<Vec<_>>();

        let output = self.launcher.run(&self.ffprobe, &args)?;
        if !output.success() {
            return Err(SegmuxError::Probe(format!(
                "{} exited with {:?}: {}",
                self.ffprobe,
                output.code,
                output.stderr.trim(),
            )));
        }

        FfprobeReport::parse(&output.stdout)
    }
}

fn inspect_with_ffmpeg(path: &Path, info: &mut MediaInfo) -> Result<(), SegmuxError> {
    ffmpeg_next::init()?;
    let input = ffmpeg_next::format::input(path).map_err(|error| SegmuxError::FileOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;

    info.format = input.format().name().to_string();
    if input.duration() > 0 {
        info.duration = Some(Duration::from_micros(input.duration() as u64));
    }
    if input.bit_rate() > 0 {
        info.bit_rate = Some(input.bit_rate() as u64);
    }

    if let Some(stream) = input.streams().best(Type::Video) {
        let parameters = stream.parameters();
        info.video_codec = Some(parameters.id().name().to_string());

        let decoder = CodecContext::from_parameters(parameters)?.decoder().video()?;
        info.set_dimensions(decoder.width(), decoder.height());

        let rate = conversion::rational_to_f64(stream.avg_frame_rate());
        let rate = if rate > 0.0 {
            rate
        } else {
            conversion::rational_to_f64(stream.rate())
        };
        if rate > 0.0 {
            info.frame_rate = Some(rate);
        }
    }

    if let Some(stream) = input.streams().best(Type::Audio) {
        let parameters = stream.parameters();
        info.audio_codec = Some(parameters.id().name().to_string());

        let decoder = CodecContext::from_parameters(parameters)?.decoder().audio()?;
        if decoder.rate() > 0 {
            info.audio_sample_rate = Some(decoder.rate());
        }
        if decoder.channels() > 0 {
            info.audio_channels = Some(decoder.channels());
        }
    }

    Ok(())
}

/// The subset of `ffprobe -print_format json` output the fallback reads.
#[derive(Debug, Default, Deserialize)]
struct FfprobeReport {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u16>,
}

impl FfprobeReport {
    fn parse(json: &str) -> Result<Self, SegmuxError> {
        serde_json::from_str(json)
            .map_err(|error| SegmuxError::Probe(format!("ffprobe JSON parse error: {error}")))
    }

    fn stream(&self, kind: &str) -> Option<&FfprobeStream> {
        self.streams
            .iter()
            .find(|stream| stream.codec_type.as_deref() == Some(kind))
    }

    /// Fill the fields of `info` that are still unknown.
    fn fill(&self, info: &mut MediaInfo) {
        if info.format.is_empty()
            && let Some(name) = &self.format.format_name
        {
            info.format = name.clone();
        }
        if info.duration.is_none() {
            info.duration = self
                .format
                .duration
                .as_deref()
                .and_then(|value| value.parse::<f64>().ok())
                .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok());
        }
        if info.bit_rate.is_none() {
            info.bit_rate = self.format.bit_rate.as_deref().and_then(|v| v.parse().ok());
        }

        if let Some(video) = self.stream("video") {
            if info.resolution.is_none()
                && let (Some(width), Some(height)) = (video.width, video.height)
            {
                info.set_dimensions(width, height);
            }
            if info.frame_rate.is_none() {
                info.frame_rate = video
                    .avg_frame_rate
                    .as_deref()
                    .and_then(parse_frame_rate)
                    .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate));
            }
            if info.video_codec.is_none() {
                info.video_codec = video.codec_name.clone();
            }
        }

        if let Some(audio) = self.stream("audio") {
            if info.audio_codec.is_none() {
                info.audio_codec = audio.codec_name.clone();
            }
            if info.audio_sample_rate.is_none() {
                info.audio_sample_rate = audio.sample_rate.as_deref().and_then(|v| v.parse().ok());
            }
            if info.audio_channels.is_none() {
                info.audio_channels = audio.channels;
            }
        }
    }
}

/// Parse `"30000/1001"` or `"25"` into frames per second.
fn parse_frame_rate(value: &str) -> Option<f64> {
    let rate = match value.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator: f64 = numerator.trim().parse().ok()?;
            let denominator: f64 = denominator.trim().parse().ok()?;
            if denominator == 0.0 {
                return None;
            }
            numerator / denominator
        }
        None => value.trim().parse().ok()?,
    };
    (rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::process::ProcessOutput;

    const SAMPLE: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 640, "height": 480,
             "r_frame_rate": "30/1", "avg_frame_rate": "30000/1001"},
            {"codec_type": "audio", "codec_name": "aac", "sample_rate": "44100", "channels": 2}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "5.000000",
                   "bit_rate": "512000"}
    }"#;

    struct CannedLauncher {
        output: ProcessOutput,
        calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    }

    impl ProcessLauncher for CannedLauncher {
        fn run(&self, program: &str, args: &[String]) -> Result<ProcessOutput, SegmuxError> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec()));
            Ok(self.output.clone())
        }
    }

    #[test]
    fn frame_rates_parse() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("24"), Some(24.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn report_fills_missing_fields_only() {
        let report = FfprobeReport::parse(SAMPLE).unwrap();
        let mut info = MediaInfo {
            format: "mp4".to_string(),
            audio_codec: Some("opus".to_string()),
            ..MediaInfo::default()
        };
        report.fill(&mut info);

        assert_eq!(info.format, "mp4");
        assert_eq!(info.audio_codec.as_deref(), Some("opus"));
        assert_eq!(info.duration, Some(Duration::from_secs(5)));
        assert_eq!(info.resolution.as_deref(), Some("640x480"));
        assert_eq!(info.video_codec.as_deref(), Some("h264"));
        assert_eq!(info.bit_rate, Some(512_000));
        assert_eq!(info.audio_sample_rate, Some(44_100));
        assert_eq!(info.audio_channels, Some(2));
        assert!((info.frame_rate.unwrap() - 29.97).abs() < 0.01);
        assert!(info.is_complete());
    }

    #[test]
    fn malformed_json_is_a_probe_error() {
        assert!(matches!(
            FfprobeReport::parse("not json"),
            Err(SegmuxError::Probe(_))
        ));
    }

    #[test]
    fn fallback_runs_ffprobe_with_json_arguments() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let launcher = CannedLauncher {
            output: ProcessOutput {
                code: Some(0),
                stdout: SAMPLE.to_string(),
                stderr: String::new(),
            },
            calls: Arc::clone(&calls),
        };
        let probe = MediaProbe::with_launcher(Box::new(launcher)).with_ffprobe("my-ffprobe");
        let report = probe.run_ffprobe(Path::new("clip.mp4")).unwrap();
        assert_eq!(report.streams.len(), 2);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (program, args) = &calls[0];
        assert_eq!(program, "my-ffprobe");
        assert_eq!(
            args,
            &[
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "clip.mp4",
            ]
        );
    }

    #[test]
    fn failing_ffprobe_is_reported() {
        let launcher = CannedLauncher {
            output: ProcessOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: "clip.mp4: Invalid data".to_string(),
            },
            calls: Arc::default(),
        };
        let probe = MediaProbe::with_launcher(Box::new(launcher));
        let result = probe.run_ffprobe(Path::new("clip.mp4"));
        assert!(matches!(result, Err(SegmuxError::Probe(message)) if message.contains("Invalid data")));
    }

    #[test]
    fn missing_file_is_file_open_error() {
        let result = MediaProbe::new().inspect("/definitely/not/here.mp4");
        assert!(matches!(result, Err(SegmuxError::FileOpen { .. })));
    }
}

//! Container reading.
//!
//! [`ContainerReader`] owns one FFmpeg demuxer context. It discovers the
//! input's streams once at open time, picks the video stream used as the
//! timing reference, and supports backward seeking to a decodable position
//! at or before a target time.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{Error as FfmpegError, Packet, format::context::Input, media::Type};

use crate::{
    conversion,
    error::SegmuxError,
    stream::{StreamDescriptor, StreamId},
};

/// Owning handle over an opened input container.
///
/// The demuxer context is released when the reader is dropped, exactly
/// once, on every exit path.
pub struct ContainerReader {
    input: Input,
    path: PathBuf,
    streams: Vec<StreamDescriptor>,
    reference: StreamId,
    duration: Duration,
}

impl Debug for ContainerReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ContainerReader")
            .field("path", &self.path)
            .field("streams", &self.streams)
            .field("reference", &self.reference)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl ContainerReader {
    /// Open a media file and discover its streams.
    ///
    /// # Errors
    ///
    /// Returns [`SegmuxError::FileOpen`] if the file is unreadable or the
    /// container is not recognised, and [`SegmuxError::NoVideoStream`] if
    /// there is no video stream to use as the timing reference.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SegmuxError> {
        let path = path.as_ref().to_path_buf();

        log::debug!("Opening input: {}", path.display());

        ffmpeg_next::init().map_err(|error| SegmuxError::FileOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| SegmuxError::FileOpen {
            path: path.clone(),
            reason: error.to_string(),
        })?;

        let streams: Vec<StreamDescriptor> = input
            .streams()
            .map(|stream| {
                let parameters = stream.parameters();
                StreamDescriptor {
                    id: StreamId(stream.index()),
                    kind: parameters.medium().into(),
                    time_base: stream.time_base(),
                    codec: parameters.id(),
                }
            })
            .collect();

        let reference = input
            .streams()
            .best(Type::Video)
            .map(|stream| StreamId(stream.index()))
            .or_else(|| streams.iter().find(|s| s.is_video()).map(|s| s.id))
            .ok_or(SegmuxError::NoVideoStream)?;

        let duration_microseconds = input.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        log::info!(
            "Opened input: {} (format={}, duration={:.2}s, streams={}, reference={})",
            path.display(),
            input.format().name(),
            duration.as_secs_f64(),
            streams.len(),
            reference,
        );

        Ok(Self {
            input,
            path,
            streams,
            reference,
            duration,
        })
    }

    /// All input streams, in container order.
    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    /// Descriptor for one stream.
    pub fn stream(&self, id: StreamId) -> Option<&StreamDescriptor> {
        self.streams.get(id.index())
    }

    /// The video stream used for range boundaries and progress.
    pub fn reference_stream(&self) -> &StreamDescriptor {
        &self.streams[self.reference.index()]
    }

    /// Container-level duration, zero if unknown.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Path this reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn input(&self) -> &Input {
        &self.input
    }

    /// Seek the reference stream to the nearest random-access point at or
    /// before `target`.
    ///
    /// Returns `target` expressed in the reference stream's time base. The
    /// following reads may yield packets earlier than `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmuxError::Seek`] if the demuxer rejects the seek.
    pub fn seek_backward(&mut self, target: Duration) -> Result<i64, SegmuxError> {
        let reference = *self.reference_stream();
        let timestamp = conversion::duration_to_stream_timestamp(target, reference.time_base);

        // SAFETY: `self.input` owns a valid, opened AVFormatContext for the
        // lifetime of `self`, and the stream index comes from that context.
        let result = unsafe {
            ffmpeg_sys_next::av_seek_frame(
                self.input.as_mut_ptr(),
                reference.id.index() as i32,
                timestamp,
                ffmpeg_sys_next::AVSEEK_FLAG_BACKWARD as i32,
            )
        };

        if result < 0 {
            return Err(SegmuxError::Seek {
                target,
                timestamp,
                reason: FfmpegError::from(result).to_string(),
            });
        }

        log::trace!("Seeked {} to ts={timestamp} ({target:?})", reference.id);
        Ok(timestamp)
    }

    /// Read the next packet from any stream.
    ///
    /// Returns `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`SegmuxError::Read`] on any demuxer failure other than end
    /// of stream.
    pub fn read_packet(&mut self) -> Result<Option<Packet>, SegmuxError> {
        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => return Ok(Some(packet)),
                Err(FfmpegError::Eof) => return Ok(None),
                Err(FfmpegError::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                    continue;
                }
                Err(error) => return Err(SegmuxError::Read(error.to_string())),
            }
        }
    }
}

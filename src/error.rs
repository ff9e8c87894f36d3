//! Error types for the `segmux` crate.
//!
//! This module defines [`SegmuxError`], the unified error type returned by
//! every fallible operation in the crate. All container-library failures on
//! the remux path surface here; none are retried.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::Error as IoError,
    path::PathBuf,
    time::Duration,
};

use ffmpeg_next::Error as FfmpegError;
use serde_json::Error as JsonError;
use thiserror::Error;

/// Which step of muxing a [`SegmuxError::Write`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    /// `avformat_write_header`.
    Header,
    /// `av_interleaved_write_frame`.
    Packet,
    /// `av_write_trailer`.
    Trailer,
}

impl Display for WriteStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            WriteStage::Header => write!(f, "header"),
            WriteStage::Packet => write!(f, "packet"),
            WriteStage::Trailer => write!(f, "trailer"),
        }
    }
}

/// The unified error type for all `segmux` operations.
///
/// Every variant is fatal to the export job that produced it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SegmuxError {
    /// The input could not be opened, or the output could not be created.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The input has no video stream to use as the timing reference.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// Backward seek on the reference stream failed.
    #[error("Failed to seek to {target:?} (stream timestamp {timestamp}): {reason}")]
    Seek {
        /// Requested segment start.
        target: Duration,
        /// Target expressed in the reference stream's time base.
        timestamp: i64,
        /// Underlying reason.
        reason: String,
    },

    /// Reading a packet from the input failed (other than end of stream).
    #[error("Failed to read packet: {0}")]
    Read(String),

    /// Writing the output header, a packet, or the trailer failed.
    #[error("Failed to write {stage}: {reason}")]
    Write {
        /// Which muxing step failed.
        stage: WriteStage,
        /// Underlying reason.
        reason: String,
    },

    /// No segment survived filtering, so there is nothing to export.
    #[error("Export job contains no active segments")]
    EmptyJob,

    /// A segment's start is not before its end.
    #[error("Invalid range: start ({start:?}) must be less than end ({end:?})")]
    InvalidRange {
        /// The start of the range.
        start: Duration,
        /// The end of the range.
        end: Duration,
    },

    /// Two segments overlap while overlaps are rejected.
    #[error(
        "Segment starting at {start:?} overlaps the previous segment ending at {previous_end:?}"
    )]
    OverlappingSegments {
        /// Start of the offending segment.
        start: Duration,
        /// End of the segment before it.
        previous_end: Duration,
    },

    /// The job was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The background export worker panicked.
    #[error("Export worker panicked: {0}")]
    WorkerPanicked(String),

    /// Media inspection failed.
    #[error("Probe failed: {0}")]
    Probe(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// Malformed JSON (segment lists, probe output).
    #[error("JSON error: {0}")]
    JsonError(#[from] JsonError),
}

impl From<FfmpegError> for SegmuxError {
    fn from(error: FfmpegError) -> Self {
        SegmuxError::FfmpegError(error.to_string())
    }
}

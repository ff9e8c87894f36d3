//! # segmux
//!
//! Cut a video into segments and glue them back together, losslessly.
//!
//! `segmux` takes a media file and an ordered list of time ranges and writes
//! one output container holding exactly those ranges, back to back, on a
//! single continuous timeline. Packets are copied without decoding or
//! re-encoding, powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Export Several Segments
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use segmux::{Segment, SegmentExporter};
//!
//! SegmentExporter::new("input.mp4", "output.mp4")?
//!     .segment(Segment::new(Duration::from_secs(10), Duration::from_secs(20)))
//!     .segment(Segment::new(Duration::from_secs(100), Duration::from_secs(130)))
//!     .run()?;
//! # Ok::<(), segmux::SegmuxError>(())
//! ```
//!
//! The output is 40 seconds long: source 10–20 s followed by source
//! 100–130 s.
//!
//! ### Export in the Background
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use segmux::{ExportOptions, FnProgress, Segment, SegmentExporter};
//!
//! let options = ExportOptions::new()
//!     .with_progress(Arc::new(FnProgress(|percent: u8| println!("{percent}%"))))
//!     .with_cpu_limit(50);
//!
//! let task = SegmentExporter::new("input.mkv", "output.mkv")?
//!     .segment(Segment::new(Duration::from_secs(0), Duration::from_secs(60)))
//!     .with_options(options)
//!     .spawn()?;
//!
//! let report = task.join()?;
//! println!("{} packets written", report.packets_written);
//! # Ok::<(), segmux::SegmuxError>(())
//! ```
//!
//! ## Behaviour
//!
//! - **Keyframe-aligned starts**: each segment begins at the nearest
//!   random-access point at or before its start; slack before the start is
//!   dropped after the seek.
//! - **Continuous timeline**: every stream's timestamps are rebased so that
//!   segments concatenate with no gaps and no backward steps.
//! - **All streams copied**: video, audio, subtitles and data streams keep
//!   their codec parameters and time bases.
//! - **Progress & cancellation**: integer percentages through a
//!   [`ProgressCallback`], and a [`CancellationToken`] checked before every
//!   packet.
//! - **CPU throttling**: an optional soft cap on process CPU usage, 30 % by
//!   default.
//! - **Probing**: [`MediaProbe`] for duration, resolution, frame rate and
//!   codecs, with an `ffprobe` fallback.
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

mod conversion;

pub mod config;
pub mod error;
pub mod export;
pub mod ffmpeg;
pub mod metadata;
pub mod probe;
pub mod process;
pub mod progress;
pub mod reader;
pub mod remux;
pub mod segment;
pub mod stream;
pub mod throttle;
pub mod timestamp;
pub mod writer;

pub use config::ExportOptions;
pub use error::{SegmuxError, WriteStage};
pub use export::{ExportReport, ExportTask, SegmentExporter, export_range, export_segments};
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use metadata::MediaInfo;
pub use probe::MediaProbe;
pub use process::{
    KillOnParentExit, NoContainment, ProcessContainment, ProcessLauncher, ProcessOutput,
    SystemLauncher,
};
pub use progress::{CancellationToken, FnProgress, ProgressCallback, ProgressInfo, ProgressMode};
pub use reader::ContainerReader;
pub use remux::{PacketAction, PacketTiming, SegmentWindow};
pub use segment::{ExportPlan, OverlapPolicy, Segment, segments_from_json};
pub use stream::{MediaKind, StreamDescriptor, StreamId};
pub use throttle::{CpuClock, CpuThrottle, DEFAULT_CPU_LIMIT_PERCENT, ProcessClock};
pub use timestamp::TimestampState;
pub use writer::{ContainerWriter, StreamIndexMap};

//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring an export,
//! [`CancellationToken`] for cooperative cancellation, and [`ProgressInfo`]
//! for progress snapshots.
//!
//! Progress is an integer percentage in `0..=100`. A callback is only
//! invoked when the value changes, and a successful job always ends on 100.
//!
//! # Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use segmux::{ExportOptions, ProgressCallback, ProgressInfo, Segment, SegmentExporter};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!(
//!             "{}% (segment {}/{})",
//!             info.percent,
//!             info.segment_index + 1,
//!             info.segment_count,
//!         );
//!     }
//! }
//!
//! let options = ExportOptions::new().with_progress(Arc::new(PrintProgress));
//! SegmentExporter::new("input.mp4", "output.mp4")?
//!     .segment(Segment::new(Duration::from_secs(10), Duration::from_secs(20)))
//!     .with_options(options)
//!     .run()?;
//! # Ok::<(), segmux::SegmuxError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// How the 0–100 sequence relates to a multi-segment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressMode {
    /// One sequence for the whole job, weighted by segment duration.
    #[default]
    Global,
    /// The sequence restarts at each segment and reaches 100 at its end.
    PerSegment,
}

/// A snapshot of export progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Completion percentage, `0..=100`.
    pub percent: u8,
    /// Zero-based index of the segment being copied.
    pub segment_index: usize,
    /// Number of segments in the job.
    pub segment_count: usize,
    /// Wall-clock time since the job started.
    pub elapsed: Duration,
    /// Source position of the reference stream packet that triggered this
    /// report, if any.
    pub position: Option<Duration>,
}

/// Trait for receiving progress updates during an export.
///
/// Implementations must be [`Send`] and [`Sync`] because jobs run on a
/// background worker.
///
/// Progress callbacks are **infallible**: they observe but cannot halt the
/// job. Use [`CancellationToken`] for that.
pub trait ProgressCallback: Send + Sync {
    /// Called whenever the percentage changes.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Adapts a plain `Fn(u8)` into a [`ProgressCallback`].
///
/// ```
/// use std::sync::Arc;
///
/// use segmux::{ExportOptions, FnProgress};
///
/// let options = ExportOptions::new()
///     .with_progress(Arc::new(FnProgress(|percent: u8| println!("{percent}%"))));
/// ```
pub struct FnProgress<F>(pub F);

impl<F> ProgressCallback for FnProgress<F>
where
    F: Fn(u8) + Send + Sync,
{
    fn on_progress(&self, info: &ProgressInfo) {
        (self.0)(info.percent);
    }
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to stop the
/// associated export before its next packet.
///
/// # Example
///
/// ```
/// use segmux::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Segment-position window in reference-stream ticks.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: i64,
    end: i64,
}

impl Window {
    /// Fraction of the window covered at `timestamp`, in `0.0..=1.0`.
    fn fraction(&self, timestamp: i64) -> f64 {
        if self.end <= self.start || timestamp <= self.start {
            return 0.0;
        }
        ((timestamp - self.start) as f64 / (self.end - self.start) as f64).clamp(0.0, 1.0)
    }
}

/// Turns reference-stream positions into a deduplicated percentage
/// sequence.
pub(crate) struct ProgressReporter {
    callback: Arc<dyn ProgressCallback>,
    mode: ProgressMode,
    durations: Vec<Duration>,
    total: Duration,
    completed: Duration,
    segment_index: usize,
    window: Window,
    last: Option<u8>,
    start_time: Instant,
}

impl ProgressReporter {
    /// Create a reporter for a job made of segments with these durations.
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        mode: ProgressMode,
        durations: Vec<Duration>,
    ) -> Self {
        let total = durations.iter().sum();
        Self {
            callback,
            mode,
            durations,
            total,
            completed: Duration::ZERO,
            segment_index: 0,
            window: Window { start: 0, end: 0 },
            last: None,
            start_time: Instant::now(),
        }
    }

    /// Enter segment `index`, whose bounds are `start..end` in reference
    /// ticks.
    pub(crate) fn begin_segment(&mut self, index: usize, start: i64, end: i64) {
        self.segment_index = index;
        self.window = Window { start, end };
        self.completed = self.durations.iter().take(index).sum();
        if self.mode == ProgressMode::PerSegment {
            self.last = None;
        }
    }

    /// Report a reference-stream packet at source `timestamp`.
    pub(crate) fn update(&mut self, timestamp: i64, position: Duration) {
        let fraction = self.window.fraction(timestamp);
        let percent = match self.mode {
            ProgressMode::PerSegment => (fraction * 100.0) as u8,
            ProgressMode::Global => self.global_percent(fraction),
        };
        self.emit(percent, Some(position));
    }

    /// Mark the current segment as fully copied.
    pub(crate) fn finish_segment(&mut self) {
        let percent = match self.mode {
            ProgressMode::PerSegment => 100,
            ProgressMode::Global => self.global_percent(1.0),
        };
        self.emit(percent, None);
    }

    /// Mark the whole job as done.
    pub(crate) fn finish(&mut self) {
        self.emit(100, None);
    }

    fn global_percent(&self, fraction: f64) -> u8 {
        if self.total.is_zero() {
            return 0;
        }
        let current = self
            .durations
            .get(self.segment_index)
            .copied()
            .unwrap_or_default();
        let done = self.completed.as_secs_f64() + current.as_secs_f64() * fraction;
        ((done / self.total.as_secs_f64()) * 100.0).clamp(0.0, 100.0) as u8
    }

    fn emit(&mut self, percent: u8, position: Option<Duration>) {
        let percent = percent.min(100);
        if let Some(last) = self.last {
            // Reordered packets can step backwards slightly; keep the
            // sequence non-decreasing.
            if percent <= last {
                return;
            }
        }
        self.last = Some(percent);

        let info = ProgressInfo {
            percent,
            segment_index: self.segment_index,
            segment_count: self.durations.len(),
            elapsed: self.start_time.elapsed(),
            position,
        };
        self.callback.on_progress(&info);
    }
}

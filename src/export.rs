//! Export jobs.
//!
//! [`SegmentExporter`] is the entry point of the crate. It validates the
//! segment list, opens the input and output once, writes the header once,
//! copies every segment back to back onto one continuous timeline, and
//! writes the trailer once.
//!
//! Jobs run synchronously with [`run`](SegmentExporter::run) or on a
//! background worker with [`spawn`](SegmentExporter::spawn).
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use segmux::{Segment, SegmentExporter};
//!
//! let report = SegmentExporter::new("input.mp4", "highlights.mp4")?
//!     .segment(Segment::new(Duration::from_secs(10), Duration::from_secs(20)))
//!     .segment(Segment::new(Duration::from_secs(100), Duration::from_secs(130)))
//!     .run()?;
//!
//! println!("{} packets, {:?} of output", report.packets_written, report.output_duration);
//! # Ok::<(), segmux::SegmuxError>(())
//! ```

use std::{
    any::Any,
    path::{Path, PathBuf},
    sync::Arc,
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crate::{
    config::ExportOptions,
    conversion,
    error::SegmuxError,
    progress::{CancellationToken, ProgressCallback, ProgressReporter},
    reader::ContainerReader,
    remux::SegmentRemux,
    segment::{ExportPlan, Segment},
    throttle::CpuThrottle,
    timestamp::TimestampState,
    writer::ContainerWriter,
};

/// Summary of a finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    /// Number of segments copied.
    pub segments: usize,
    /// Packets written to the output, all streams.
    pub packets_written: u64,
    /// Packets read but dropped as seek slack before a segment start.
    pub packets_discarded: u64,
    /// Length of the output's reference stream timeline.
    pub output_duration: Duration,
    /// Wall-clock time of the job.
    pub elapsed: Duration,
}

/// Builder and runner for one export job.
#[derive(Debug, Clone)]
pub struct SegmentExporter {
    input_path: PathBuf,
    output_path: PathBuf,
    segments: Vec<Segment>,
    options: ExportOptions,
}

impl SegmentExporter {
    /// Create an exporter from `input` to `output`.
    ///
    /// The output container format is inferred from the output extension.
    ///
    /// # Errors
    ///
    /// Returns [`SegmuxError::FileOpen`] if `input` does not exist.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<Self, SegmuxError> {
        let input_path = input.as_ref().to_path_buf();
        if !input_path.exists() {
            return Err(SegmuxError::FileOpen {
                path: input_path,
                reason: "File does not exist".to_string(),
            });
        }

        Ok(Self {
            input_path,
            output_path: output.as_ref().to_path_buf(),
            segments: Vec::new(),
            options: ExportOptions::default(),
        })
    }

    /// Add one segment to the job.
    #[must_use]
    pub fn segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Add several segments to the job.
    #[must_use]
    pub fn segments<I: IntoIterator<Item = Segment>>(mut self, segments: I) -> Self {
        self.segments.extend(segments);
        self
    }

    /// Set the job options.
    #[must_use]
    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the job on the calling thread.
    ///
    /// Nothing is created on disk if the segment list is rejected. If the
    /// job fails after the output was created, a partial file is left
    /// behind.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; see [`SegmuxError`].
    pub fn run(&self) -> Result<ExportReport, SegmuxError> {
        let plan = ExportPlan::new(self.segments.clone(), self.options.overlap_policy)?;
        let started = Instant::now();

        log::info!(
            "Exporting {} segment(s) ({:.2}s) from {} to {}",
            plan.len(),
            plan.total_duration().as_secs_f64(),
            self.input_path.display(),
            self.output_path.display(),
        );

        let mut reader = ContainerReader::open(&self.input_path)?;
        let source_duration = reader.duration();
        for segment in plan.segments() {
            if !source_duration.is_zero() && segment.start >= source_duration {
                log::warn!(
                    "Segment {:?}..{:?} starts past the end of the source ({:?})",
                    segment.start,
                    segment.end,
                    source_duration,
                );
            }
        }

        let (mut writer, stream_map) = ContainerWriter::create(&self.output_path, &reader)?;
        writer.write_header()?;

        let mut state = TimestampState::new(reader.streams().iter().map(|s| s.id));
        let mut throttle = self.options.cpu_limit.map(CpuThrottle::new);
        let mut progress = self.options.has_progress.then(|| {
            ProgressReporter::new(
                Arc::clone(&self.options.progress),
                self.options.progress_mode,
                plan.durations(),
            )
        });

        let reference = *reader.reference_stream();
        let mut packets_written = 0;
        let mut packets_discarded = 0;
        let mut output_ticks = 0;

        for (index, segment) in plan.segments().iter().enumerate() {
            let stats = SegmentRemux {
                reader: &mut reader,
                writer: &mut writer,
                stream_map: &stream_map,
                state: &mut state,
                throttle: throttle.as_mut(),
                progress: progress.as_mut(),
                options: &self.options,
            }
            .run(index, segment)?;

            packets_written += stats.written;
            packets_discarded += stats.discarded;
            if let Some(end) = stats.reference_end {
                output_ticks = output_ticks.max(end);
            }
        }

        writer.finish()?;

        if let Some(progress) = progress.as_mut() {
            progress.finish();
        }
        if let Some(throttle) = &throttle
            && throttle.pauses() > 0
        {
            log::debug!(
                "CPU throttle paused {} time(s) for {:?}",
                throttle.pauses(),
                throttle.paused_for(),
            );
        }

        let report = ExportReport {
            segments: plan.len(),
            packets_written,
            packets_discarded,
            output_duration: conversion::stream_timestamp_to_duration(
                output_ticks,
                reference.time_base,
            ),
            elapsed: started.elapsed(),
        };

        log::info!(
            "Export finished: {} packet(s) written, {:.2}s of output in {:.2}s",
            report.packets_written,
            report.output_duration.as_secs_f64(),
            report.elapsed.as_secs_f64(),
        );

        Ok(report)
    }

    /// Run the job on a background worker thread.
    ///
    /// If no cancellation token was configured, one is attached so the
    /// returned [`ExportTask`] can always be cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SegmuxError::IoError`] if the worker thread cannot be
    /// started.
    pub fn spawn(mut self) -> Result<ExportTask, SegmuxError> {
        let token = match &self.options.cancellation {
            Some(token) => token.clone(),
            None => {
                let token = CancellationToken::new();
                self.options.cancellation = Some(token.clone());
                token
            }
        };

        let handle = std::thread::Builder::new()
            .name("segmux-export".to_string())
            .spawn(move || self.run())?;

        Ok(ExportTask { handle, token })
    }
}

/// A job running on a background worker.
#[derive(Debug)]
pub struct ExportTask {
    handle: JoinHandle<Result<ExportReport, SegmuxError>>,
    token: CancellationToken,
}

impl ExportTask {
    /// Ask the job to stop before its next packet.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the worker has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job and return its outcome.
    ///
    /// # Errors
    ///
    /// The job's own error, or [`SegmuxError::WorkerPanicked`].
    pub fn join(self) -> Result<ExportReport, SegmuxError> {
        self.handle
            .join()
            .map_err(|payload| SegmuxError::WorkerPanicked(panic_message(payload.as_ref())))?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Export the active segments of `segments` into one output file.
///
/// Convenience wrapper over [`SegmentExporter`] that logs any failure and
/// reports only success. `progress` receives the global percentage.
pub fn export_segments<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    segments: Vec<Segment>,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> bool {
    let mut options = ExportOptions::new();
    if let Some(progress) = progress {
        options = options.with_progress(progress);
    }

    let result = SegmentExporter::new(input, output)
        .and_then(|exporter| exporter.segments(segments).with_options(options).run());

    match result {
        Ok(_) => true,
        Err(error) => {
            log::error!("Segment export failed: {error}");
            false
        }
    }
}

/// Export one range given as a start and a length.
///
/// Equivalent to [`export_segments`] with a single segment.
pub fn export_range<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    start: Duration,
    duration: Duration,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> bool {
    export_segments(
        input,
        output,
        vec![Segment::from_duration(start, duration)],
        progress,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_is_rejected_up_front() {
        let result = SegmentExporter::new("/definitely/not/here.mp4", "out.mp4");
        assert!(matches!(result, Err(SegmuxError::FileOpen { .. })));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}

//! Segment remuxing.
//!
//! Copies the packets of one time range from a [`ContainerReader`] to a
//! [`ContainerWriter`] without re-encoding. Per segment:
//!
//! 1. Convert the range to reference-stream ticks and seek backward to a
//!    random-access point at or before the start.
//! 2. Reset every stream's basis in the [`TimestampState`].
//! 3. Pump packets until the reference stream passes the end: drop the seek
//!    slack before the start, rebase the rest onto the output timeline,
//!    rescale to the output time base, and write them interleaved.
//!
//! The per-packet step is exposed as [`SegmentWindow::apply`] (decide, then
//! advance the stream's offset on write) so it can be exercised without a
//! media file. [`SegmentWindow::classify`] is the decision alone.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use ffmpeg_next::{Rational, codec::Id};
//! use segmux::{
//!     MediaKind, PacketAction, PacketTiming, Segment, SegmentWindow, StreamDescriptor,
//!     StreamId, TimestampState,
//! };
//!
//! let video = StreamDescriptor {
//!     id: StreamId(0),
//!     kind: MediaKind::Video,
//!     time_base: Rational::new(1, 1000),
//!     codec: Id::H264,
//! };
//! let segment = Segment::new(Duration::from_secs(10), Duration::from_secs(20));
//! let window = SegmentWindow::new(&segment, &[video], &video);
//! let mut state = TimestampState::new([video.id]);
//! state.begin_segment();
//!
//! // Keyframe before the start: becomes the basis, but is dropped.
//! let keyframe = PacketTiming { stream: video.id, pts: Some(9_000), dts: Some(9_000) };
//! assert_eq!(window.classify(&video, keyframe, &mut state), PacketAction::Discard);
//!
//! let first = PacketTiming { stream: video.id, pts: Some(10_000), dts: Some(10_000) };
//! assert_eq!(
//!     window.apply(&video, first, &mut state),
//!     PacketAction::Write { pts: Some(1_000), dts: Some(1_000) },
//! );
//! assert_eq!(state.output_offset(video.id), 1_001);
//!
//! let past_end = PacketTiming { stream: video.id, pts: Some(20_001), dts: Some(20_001) };
//! assert_eq!(window.classify(&video, past_end, &mut state), PacketAction::Stop);
//! ```

use std::collections::HashMap;

use crate::{
    config::ExportOptions,
    conversion,
    error::SegmuxError,
    progress::ProgressReporter,
    reader::ContainerReader,
    segment::Segment,
    stream::{StreamDescriptor, StreamId},
    throttle::CpuThrottle,
    timestamp::TimestampState,
    writer::{ContainerWriter, StreamIndexMap},
};

/// Raw timestamps of one demuxed packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketTiming {
    /// Input stream the packet belongs to.
    pub stream: StreamId,
    /// Presentation timestamp, if known.
    pub pts: Option<i64>,
    /// Decode timestamp, if known.
    pub dts: Option<i64>,
}

impl PacketTiming {
    /// PTS, falling back to DTS.
    fn position(&self) -> Option<i64> {
        self.pts.or(self.dts)
    }
}

/// What the packet loop does with one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketAction {
    /// The reference stream passed the segment end; the segment is done.
    Stop,
    /// Seek slack before the segment start; skip it.
    Discard,
    /// Write the packet with these rebased timestamps (input time base).
    Write {
        /// Rebased presentation timestamp.
        pts: Option<i64>,
        /// Rebased decode timestamp.
        dts: Option<i64>,
    },
}

/// One segment's bounds, precomputed in every stream's time base.
#[derive(Debug, Clone)]
pub struct SegmentWindow {
    reference: StreamId,
    start_ts: i64,
    end_ts: i64,
    thresholds: HashMap<StreamId, i64>,
}

impl SegmentWindow {
    /// Compute the window of `segment` for the given streams, using
    /// `reference` for the end boundary.
    pub fn new(segment: &Segment, streams: &[StreamDescriptor], reference: &StreamDescriptor) -> Self {
        let thresholds: HashMap<StreamId, i64> = streams
            .iter()
            .chain(std::iter::once(reference))
            .map(|stream| {
                (
                    stream.id,
                    conversion::duration_to_stream_timestamp(segment.start, stream.time_base),
                )
            })
            .collect();

        Self {
            reference: reference.id,
            start_ts: conversion::duration_to_stream_timestamp(segment.start, reference.time_base),
            end_ts: conversion::duration_to_stream_timestamp(segment.end, reference.time_base),
            thresholds,
        }
    }

    /// Segment start in reference ticks.
    pub fn start_ts(&self) -> i64 {
        self.start_ts
    }

    /// Segment end in reference ticks.
    pub fn end_ts(&self) -> i64 {
        self.end_ts
    }

    /// Decide what to do with one packet, recording the stream's basis in
    /// `state` if this is its first timed packet of the segment.
    ///
    /// The basis is taken before slack is discarded, so the first kept
    /// packet lands slightly after the stream's offset when the seek fell
    /// on an earlier keyframe.
    pub fn classify(
        &self,
        stream: &StreamDescriptor,
        timing: PacketTiming,
        state: &mut TimestampState,
    ) -> PacketAction {
        let position = timing.position();

        if stream.id == self.reference
            && let Some(position) = position
            && position > self.end_ts
        {
            return PacketAction::Stop;
        }

        state.observe(stream.id, timing.dts, timing.pts);

        let threshold = self.thresholds.get(&stream.id).copied().unwrap_or(0);
        if let Some(position) = position
            && position < threshold
        {
            return PacketAction::Discard;
        }

        PacketAction::Write {
            pts: state.rebase(stream.id, timing.pts),
            dts: state.rebase(stream.id, timing.dts),
        }
    }

    /// [`classify`](Self::classify) one packet and, if it is to be written,
    /// move the stream's output offset past it.
    pub fn apply(
        &self,
        stream: &StreamDescriptor,
        timing: PacketTiming,
        state: &mut TimestampState,
    ) -> PacketAction {
        let action = self.classify(stream, timing, state);
        if let PacketAction::Write { pts, dts } = action {
            state.advance(stream.id, pts, dts);
        }
        action
    }
}

/// Counters for one copied segment.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SegmentStats {
    pub(crate) written: u64,
    pub(crate) discarded: u64,
    /// End of the last reference packet on the output timeline, in
    /// reference input ticks.
    pub(crate) reference_end: Option<i64>,
}

/// Everything a segment copy borrows from its job.
pub(crate) struct SegmentRemux<'a> {
    pub(crate) reader: &'a mut ContainerReader,
    pub(crate) writer: &'a mut ContainerWriter,
    pub(crate) stream_map: &'a StreamIndexMap,
    pub(crate) state: &'a mut TimestampState,
    pub(crate) throttle: Option<&'a mut CpuThrottle>,
    pub(crate) progress: Option<&'a mut ProgressReporter>,
    pub(crate) options: &'a ExportOptions,
}

impl SegmentRemux<'_> {
    /// Copy segment number `index`.
    ///
    /// Any seek, read, or write failure aborts immediately. Reaching the end
    /// of the input before the segment end is not an error.
    pub(crate) fn run(&mut self, index: usize, segment: &Segment) -> Result<SegmentStats, SegmuxError> {
        let reference = *self.reader.reference_stream();
        let window = SegmentWindow::new(segment, self.reader.streams(), &reference);

        self.reader.seek_backward(segment.start)?;
        self.state.begin_segment();
        if let Some(progress) = self.progress.as_deref_mut() {
            progress.begin_segment(index, window.start_ts(), window.end_ts());
        }

        let mut stats = SegmentStats::default();

        loop {
            if self.options.is_cancelled() {
                log::info!("Export cancelled during segment {index}");
                return Err(SegmuxError::Cancelled);
            }

            let Some(mut packet) = self.reader.read_packet()? else {
                log::debug!("Input ended before segment {index} reached its end");
                break;
            };

            let input_id = StreamId(packet.stream());
            let Some(descriptor) = self.reader.stream(input_id).copied() else {
                continue;
            };
            let Some(output_id) = self.stream_map.get(input_id) else {
                continue;
            };

            let timing = PacketTiming {
                stream: input_id,
                pts: packet.pts(),
                dts: packet.dts(),
            };

            let (pts, dts) = match window.apply(&descriptor, timing, self.state) {
                PacketAction::Stop => break,
                PacketAction::Discard => {
                    stats.discarded += 1;
                    continue;
                }
                PacketAction::Write { pts, dts } => (pts, dts),
            };

            let duration = packet.duration();
            let output_time_base = self
                .writer
                .output_time_base(output_id)
                .unwrap_or(descriptor.time_base);

            packet.set_pts(pts);
            packet.set_dts(dts);
            packet.rescale_ts(descriptor.time_base, output_time_base);
            packet.set_position(-1);
            packet.set_stream(output_id.index());
            self.writer.write_packet(&mut packet)?;
            stats.written += 1;

            if input_id == reference.id {
                if let Some(rebased) = pts.or(dts) {
                    let end = rebased + duration.max(0);
                    stats.reference_end = Some(stats.reference_end.map_or(end, |e| e.max(end)));
                }
                if let (Some(progress), Some(position)) =
                    (self.progress.as_deref_mut(), timing.position())
                {
                    progress.update(
                        position,
                        conversion::stream_timestamp_to_duration(position, descriptor.time_base),
                    );
                }
            }

            if let Some(throttle) = self.throttle.as_deref_mut() {
                throttle.throttle();
            }
        }

        if let Some(progress) = self.progress.as_deref_mut() {
            progress.finish_segment();
        }

        log::debug!(
            "Segment {index} ({:?}..{:?}): wrote {} packet(s), discarded {}",
            segment.start,
            segment.end,
            stats.written,
            stats.discarded,
        );

        Ok(stats)
    }
}

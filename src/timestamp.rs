//! Cross-segment timestamp continuity.
//!
//! [`TimestampState`] holds, per stream, the first decode timestamp seen in
//! the current segment (the segment's zero basis) and a running output
//! offset that only ever grows. Rebasing a packet as
//! `ts - basis + offset` makes consecutive segments concatenate into one
//! gapless, monotonic timeline.
//!
//! All values are in the *input* stream's time base; rescaling to the output
//! time base happens after rebasing.
//!
//! # Example
//!
//! ```
//! use segmux::{StreamId, TimestampState};
//!
//! let video = StreamId(0);
//! let mut state = TimestampState::new([video]);
//!
//! // Segment 1 starts at source DTS 1000.
//! state.begin_segment();
//! state.observe(video, Some(1000), Some(1000));
//! assert_eq!(state.rebase(video, Some(1000)), Some(0));
//!
//! // Last packet of segment 1 is at source DTS 2999.
//! let last = state.rebase(video, Some(2999));
//! assert_eq!(last, Some(1999));
//! state.advance(video, last, last);
//!
//! // Segment 2 starts at source DTS 9000 but continues right after 1999.
//! state.begin_segment();
//! state.observe(video, Some(9000), Some(9000));
//! assert_eq!(state.rebase(video, Some(9000)), Some(2000));
//! ```

use std::collections::HashMap;

use crate::stream::StreamId;

/// Per-stream bookkeeping, owned by exactly one export job.
#[derive(Debug, Clone, Default)]
pub struct TimestampState {
    /// First DTS (PTS fallback) of each stream in the current segment.
    /// `None` until the stream's first timed packet arrives.
    first_dts: HashMap<StreamId, Option<i64>>,
    /// Where the next segment's zero lands for each stream.
    output_offset: HashMap<StreamId, i64>,
}

impl TimestampState {
    /// Create state for the given streams, with every offset at zero.
    pub fn new<I: IntoIterator<Item = StreamId>>(streams: I) -> Self {
        let mut state = Self::default();
        for stream in streams {
            state.first_dts.insert(stream, None);
            state.output_offset.insert(stream, 0);
        }
        state
    }

    /// Forget every stream's basis. Offsets are kept.
    pub fn begin_segment(&mut self) {
        for basis in self.first_dts.values_mut() {
            *basis = None;
        }
    }

    /// Record `dts` (or `pts` when DTS is unknown) as the stream's basis if
    /// none has been recorded yet for this segment.
    pub fn observe(&mut self, stream: StreamId, dts: Option<i64>, pts: Option<i64>) {
        let basis = self.first_dts.entry(stream).or_insert(None);
        if basis.is_none() {
            *basis = dts.or(pts);
        }
    }

    /// The current segment's basis for `stream`.
    pub fn basis(&self, stream: StreamId) -> Option<i64> {
        self.first_dts.get(&stream).copied().flatten()
    }

    /// The offset the current segment is shifted by for `stream`.
    pub fn output_offset(&self, stream: StreamId) -> i64 {
        self.output_offset.get(&stream).copied().unwrap_or(0)
    }

    /// Shift one timestamp onto the output timeline.
    ///
    /// Unknown timestamps stay unknown. A stream whose basis was never
    /// established is only shifted by its offset.
    pub fn rebase(&self, stream: StreamId, timestamp: Option<i64>) -> Option<i64> {
        let timestamp = timestamp?;
        let basis = self.basis(stream).unwrap_or(0);
        Some(timestamp - basis + self.output_offset(stream))
    }

    /// Push the stream's offset past an emitted packet so the next segment
    /// starts strictly after it. Takes *rebased* timestamps.
    pub fn advance(&mut self, stream: StreamId, rebased_pts: Option<i64>, rebased_dts: Option<i64>) {
        let last = match (rebased_pts, rebased_dts) {
            (Some(pts), Some(dts)) => pts.max(dts),
            (Some(ts), None) | (None, Some(ts)) => ts,
            (None, None) => return,
        };

        let offset = self.output_offset.entry(stream).or_insert(0);
        *offset = (*offset).max(last + 1);
    }
}

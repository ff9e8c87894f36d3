//! Segments and export planning.
//!
//! A [`Segment`] is a time range of the source to keep. An [`ExportPlan`]
//! is the validated, ordered list of active segments for one export job.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use segmux::{ExportPlan, OverlapPolicy, Segment};
//!
//! let plan = ExportPlan::new(
//!     vec![
//!         Segment::new(Duration::from_secs(100), Duration::from_secs(130)),
//!         Segment::new(Duration::from_secs(10), Duration::from_secs(20)),
//!         Segment::new(Duration::from_secs(50), Duration::from_secs(60)).deleted(),
//!     ],
//!     OverlapPolicy::Reject,
//! )?;
//!
//! assert_eq!(plan.len(), 2);
//! assert_eq!(plan.segments()[0].start, Duration::from_secs(10));
//! assert_eq!(plan.total_duration(), Duration::from_secs(40));
//! # Ok::<(), segmux::SegmuxError>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SegmuxError;

/// One time range of the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Display name; not used by the export itself.
    #[serde(default)]
    pub name: String,
    /// Inclusive start in the source timeline.
    #[serde(with = "seconds", alias = "startTime")]
    pub start: Duration,
    /// End in the source timeline. Must be after `start`.
    #[serde(with = "seconds", alias = "endTime")]
    pub end: Duration,
    /// Deleted segments are skipped by every export.
    #[serde(default, alias = "is_deleted")]
    pub is_deleted: bool,
    /// Editor selection state; not used by the export itself.
    #[serde(default, alias = "is_selected")]
    pub is_selected: bool,
}

impl Segment {
    /// Create an active, unnamed segment.
    pub fn new(start: Duration, end: Duration) -> Self {
        Self {
            name: String::new(),
            start,
            end,
            is_deleted: false,
            is_selected: false,
        }
    }

    /// Create a segment from a start and a length.
    pub fn from_duration(start: Duration, duration: Duration) -> Self {
        Self::new(start, start + duration)
    }

    /// Set the display name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Mark the segment deleted.
    #[must_use]
    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    /// Length of the range, zero if malformed.
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// What to do when two active segments overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Fail with [`SegmuxError::OverlappingSegments`].
    #[default]
    Reject,
    /// Export overlapping ranges as-is; the overlapped content appears
    /// twice in the output.
    Permit,
}

/// The validated, start-ordered list of active segments of one job.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    segments: Vec<Segment>,
}

impl ExportPlan {
    /// Build a plan from raw editor segments.
    ///
    /// Deleted segments are dropped and the rest are stably sorted by start,
    /// so segments with equal starts keep their list order.
    ///
    /// # Errors
    ///
    /// - [`SegmuxError::InvalidRange`] if a segment's end is not after its start.
    /// - [`SegmuxError::OverlappingSegments`] if two segments overlap and
    ///   `policy` is [`OverlapPolicy::Reject`].
    /// - [`SegmuxError::EmptyJob`] if no segment remains.
    pub fn new(segments: Vec<Segment>, policy: OverlapPolicy) -> Result<Self, SegmuxError> {
        let mut active: Vec<Segment> = segments.into_iter().filter(|s| !s.is_deleted).collect();
        if active.is_empty() {
            return Err(SegmuxError::EmptyJob);
        }

        active.sort_by_key(|segment| segment.start);

        for segment in &active {
            if segment.end <= segment.start {
                return Err(SegmuxError::InvalidRange {
                    start: segment.start,
                    end: segment.end,
                });
            }
        }

        if policy == OverlapPolicy::Reject {
            for pair in active.windows(2) {
                if pair[1].start < pair[0].end {
                    return Err(SegmuxError::OverlappingSegments {
                        start: pair[1].start,
                        previous_end: pair[0].end,
                    });
                }
            }
        }

        Ok(Self { segments: active })
    }

    /// The ordered active segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments to export.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always `false`; an empty plan cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Sum of all segment durations.
    pub fn total_duration(&self) -> Duration {
        self.segments.iter().map(Segment::duration).sum()
    }

    /// Per-segment durations, in export order.
    pub(crate) fn durations(&self) -> Vec<Duration> {
        self.segments.iter().map(Segment::duration).collect()
    }
}

/// Parse a JSON array of segments.
///
/// Times are seconds (`{"start": 10.0, "end": 20.5}`); the editor's
/// `startTime`/`endTime`/`isDeleted` spellings are also accepted.
pub fn segments_from_json(json: &str) -> Result<Vec<Segment>, SegmuxError> {
    Ok(serde_json::from_str(json)?)
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(seconds).map_err(D::Error::custom)
    }
}

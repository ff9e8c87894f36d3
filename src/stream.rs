//! Stream identity and descriptors.
//!
//! A [`StreamDescriptor`] is built once per opened container and never
//! changes afterwards. The media kind is fixed at discovery time, so the
//! packet loop never needs to re-inspect codec parameters.

use std::fmt::{Display, Formatter, Result as FmtResult};

use ffmpeg_next::{Rational, codec::Id, media::Type};

/// Index of a stream inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub usize);

impl StreamId {
    /// The raw container index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for StreamId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "#{}", self.0)
    }
}

/// Closed classification of a stream's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Video.
    Video,
    /// Audio.
    Audio,
    /// Subtitles.
    Subtitle,
    /// Data, attachments, or anything unrecognised.
    Other,
}

impl From<Type> for MediaKind {
    fn from(medium: Type) -> Self {
        match medium {
            Type::Video => MediaKind::Video,
            Type::Audio => MediaKind::Audio,
            Type::Subtitle => MediaKind::Subtitle,
            _ => MediaKind::Other,
        }
    }
}

/// Immutable description of one input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Position in the input container.
    pub id: StreamId,
    /// Payload classification.
    pub kind: MediaKind,
    /// Unit in which this stream's timestamps are expressed.
    pub time_base: Rational,
    /// Codec of the compressed payload.
    pub codec: Id,
}

impl StreamDescriptor {
    /// Whether this stream carries video.
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

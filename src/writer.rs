//! Stream mapping and container writing.
//!
//! [`ContainerWriter::create`] builds one output stream per input stream,
//! copying time base and codec parameters verbatim, and returns the
//! [`StreamIndexMap`] from input to output stream. The writer then accepts
//! rebased, rescaled packets and interleaves them into the output.

use std::{
    collections::BTreeMap,
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{Packet, Rational, codec::Id, format::context::Output};

use crate::{
    error::{SegmuxError, WriteStage},
    reader::ContainerReader,
    stream::StreamId,
};

/// Input stream → output stream.
///
/// Identity in practice, since every input stream is copied in order, but
/// kept explicit so the packet loop never assumes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamIndexMap {
    map: BTreeMap<StreamId, StreamId>,
}

impl StreamIndexMap {
    /// Record that `input` is written to `output`.
    pub fn insert(&mut self, input: StreamId, output: StreamId) {
        self.map.insert(input, output);
    }

    /// Output stream for `input`, if it is mapped.
    pub fn get(&self, input: StreamId) -> Option<StreamId> {
        self.map.get(&input).copied()
    }

    /// Number of mapped streams.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All `(input, output)` pairs in input order.
    pub fn iter(&self) -> impl Iterator<Item = (StreamId, StreamId)> + '_ {
        self.map.iter().map(|(input, output)| (*input, *output))
    }
}

/// Owning handle over an output container and its I/O context.
///
/// Dropping the writer closes the I/O context and frees the muxer context
/// exactly once. The trailer is only written by [`finish`](Self::finish).
pub struct ContainerWriter {
    output: Output,
    path: PathBuf,
    time_bases: Vec<Rational>,
    header_written: bool,
}

impl Debug for ContainerWriter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ContainerWriter")
            .field("path", &self.path)
            .field("time_bases", &self.time_bases)
            .field("header_written", &self.header_written)
            .finish_non_exhaustive()
    }
}

impl ContainerWriter {
    /// Create the output file and one output stream per input stream.
    ///
    /// The output container format is inferred from the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`SegmuxError::FileOpen`] if the output cannot be created,
    /// or [`SegmuxError::FfmpegError`] if a stream cannot be added.
    pub fn create<P: AsRef<Path>>(
        path: P,
        reader: &ContainerReader,
    ) -> Result<(Self, StreamIndexMap), SegmuxError> {
        let path = path.as_ref().to_path_buf();

        let mut output =
            ffmpeg_next::format::output(&path).map_err(|error| SegmuxError::FileOpen {
                path: path.clone(),
                reason: format!("Failed to create output: {error}"),
            })?;

        let mut stream_map = StreamIndexMap::default();

        for in_stream in reader.input().streams() {
            let mut out_stream = output.add_stream(ffmpeg_next::encoder::find(Id::None))?;
            out_stream.set_parameters(in_stream.parameters());
            out_stream.set_time_base(in_stream.time_base());
            // Let the muxer pick a tag valid for its own container.
            unsafe {
                (*out_stream.parameters().as_mut_ptr()).codec_tag = 0;
            }
            stream_map.insert(StreamId(in_stream.index()), StreamId(out_stream.index()));
        }

        log::debug!(
            "Created output {} ({}) with {} stream(s)",
            path.display(),
            output.format().name(),
            stream_map.len(),
        );

        Ok((
            Self {
                output,
                path,
                time_bases: Vec::new(),
                header_written: false,
            },
            stream_map,
        ))
    }

    /// Write the container header.
    ///
    /// The muxer may adjust stream time bases here, so output time bases
    /// are only available afterwards.
    pub fn write_header(&mut self) -> Result<(), SegmuxError> {
        self.output
            .write_header()
            .map_err(|error| SegmuxError::Write {
                stage: WriteStage::Header,
                reason: error.to_string(),
            })?;

        self.time_bases = self.output.streams().map(|s| s.time_base()).collect();
        self.header_written = true;
        Ok(())
    }

    /// Time base of an output stream, known once the header is written.
    pub fn output_time_base(&self, stream: StreamId) -> Option<Rational> {
        self.time_bases.get(stream.index()).copied()
    }

    /// Hand one packet to the interleaving muxer.
    pub fn write_packet(&mut self, packet: &mut Packet) -> Result<(), SegmuxError> {
        packet
            .write_interleaved(&mut self.output)
            .map_err(|error| SegmuxError::Write {
                stage: WriteStage::Packet,
                reason: error.to_string(),
            })
    }

    /// Write the trailer and release the output.
    pub fn finish(mut self) -> Result<(), SegmuxError> {
        if !self.header_written {
            return Err(SegmuxError::Write {
                stage: WriteStage::Trailer,
                reason: "header was never written".to_string(),
            });
        }

        self.output
            .write_trailer()
            .map_err(|error| SegmuxError::Write {
                stage: WriteStage::Trailer,
                reason: error.to_string(),
            })?;

        log::debug!("Finished output {}", self.path.display());
        Ok(())
    }

    /// Path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

//! Compressed sample blocks.
//!
//! A block is written as one self-delimiting frame (all integers
//! little-endian):
//!
//! ```text
//! magic   "LSB1"   4 bytes
//! count   u32      number of samples
//! first   i64      first sample timestamp, unix millis
//! last    i64      last sample timestamp, unix millis
//! length  u32      compressed payload length
//! payload [u8]     lz4, size-prepended, of the samples as JSON lines
//! ```
//!
//! Frames can be appended back to back; [`BlockReader`] walks them in order.

use std::io::{self, Read, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{MetricsError, Result};
use crate::sample::Sample;

/// Frame magic.
pub const BLOCK_MAGIC: [u8; 4] = *b"LSB1";

/// Size of the fixed frame header.
pub const HEADER_LEN: usize = 28;

/// Largest compressed payload a reader will allocate for.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

/// Largest decompressed payload a block may declare.
pub const MAX_BLOCK_LEN: usize = 256 * 1024 * 1024;

/// An ordered batch of samples flushed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    samples: Vec<Sample>,
}

/// Count and time range of a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    /// Number of samples
    pub samples: usize,
    /// Timestamp of the first sample
    pub first: Option<DateTime<Utc>>,
    /// Timestamp of the last sample
    pub last: Option<DateTime<Utc>>,
}

impl BlockSummary {
    /// Extends this summary with a later one.
    pub fn merge(&mut self, other: &Self) {
        self.samples += other.samples;
        if self.first.is_none() {
            self.first = other.first;
        }
        if other.last.is_some() {
            self.last = other.last;
        }
    }
}

impl Block {
    /// Creates a block from samples in arrival order.
    #[must_use]
    pub const fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Returns the samples.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Consumes the block, returning its samples.
    #[must_use]
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// Returns the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the block holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the sample count and time range.
    #[must_use]
    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            samples: self.samples.len(),
            first: self.samples.first().map(|s| s.timestamp),
            last: self.samples.last().map(|s| s.timestamp),
        }
    }

    /// Encodes the block as a frame.
    ///
    /// # Errors
    ///
    /// Returns an error if a sample cannot be serialized or the block is
    /// too large for the frame header.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut lines = Vec::new();
        for sample in &self.samples {
            serde_json::to_writer(&mut lines, sample)?;
            lines.push(b'\n');
        }
        if lines.len() > MAX_BLOCK_LEN {
            return Err(MetricsError::Decode(format!(
                "block of {} bytes exceeds limit",
                lines.len()
            )));
        }
        let compressed = lz4_flex::block::compress_prepend_size(&lines);

        let count = u32::try_from(self.samples.len())
            .map_err(|_| MetricsError::Decode("too many samples for one block".to_string()))?;
        let length = u32::try_from(compressed.len())
            .map_err(|_| MetricsError::Decode("block payload too large".to_string()))?;
        let millis = |ts: Option<DateTime<Utc>>| ts.map_or(0, |t| t.timestamp_millis());
        let summary = self.summary();

        let mut frame = Vec::with_capacity(HEADER_LEN + compressed.len());
        frame.extend_from_slice(&BLOCK_MAGIC);
        frame.extend_from_slice(&count.to_le_bytes());
        frame.extend_from_slice(&millis(summary.first).to_le_bytes());
        frame.extend_from_slice(&millis(summary.last).to_le_bytes());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&compressed);
        Ok(frame)
    }

    /// Encodes the block and writes the frame, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if encoding or writing fails.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<u64> {
        let frame = self.encode().map_err(io::Error::other)?;
        writer.write_all(&frame)?;
        Ok(frame.len() as u64)
    }
}

/// Iterates the frames of a block stream.
///
/// Iteration stops after the first error.
#[derive(Debug)]
pub struct BlockReader<R> {
    reader: R,
    done: bool,
}

impl<R: Read> BlockReader<R> {
    /// Wraps a reader positioned at the start of a frame.
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }

    /// Reads the next block, or `None` at a clean end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Decode`] for truncated or corrupt frames.
    pub fn read_block(&mut self) -> Result<Option<Block>> {
        let mut header = [0u8; HEADER_LEN];
        match read_full(&mut self.reader, &mut header)? {
            0 => return Ok(None),
            n if n < HEADER_LEN => {
                return Err(MetricsError::Decode(format!(
                    "truncated header: {n} of {HEADER_LEN} bytes"
                )));
            }
            _ => {}
        }
        if header[..4] != BLOCK_MAGIC {
            return Err(MetricsError::Decode("bad frame magic".to_string()));
        }

        let count = u32_at(&header, 4) as usize;
        let length = u32_at(&header, 24) as usize;
        if length > MAX_PAYLOAD_LEN {
            return Err(MetricsError::Decode(format!(
                "payload length {length} exceeds limit"
            )));
        }

        let mut payload = vec![0u8; length];
        let read = read_full(&mut self.reader, &mut payload)?;
        if read < length {
            return Err(MetricsError::Decode(format!(
                "truncated payload: {read} of {length} bytes"
            )));
        }

        let Some((prefix, compressed)) = payload.split_first_chunk::<4>() else {
            return Err(MetricsError::Decode("payload missing size prefix".to_string()));
        };
        let size = u32::from_le_bytes(*prefix) as usize;
        if size > MAX_BLOCK_LEN {
            return Err(MetricsError::Decode(format!(
                "decompressed size {size} exceeds limit"
            )));
        }
        let lines = lz4_flex::block::decompress(compressed, size)
            .map_err(|e| MetricsError::Decode(e.to_string()))?;
        let samples = lines
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(serde_json::from_slice::<Sample>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| MetricsError::Decode(e.to_string()))?;
        if samples.len() != count {
            return Err(MetricsError::Decode(format!(
                "header declares {count} samples, payload holds {}",
                samples.len()
            )));
        }
        Ok(Some(Block::new(samples)))
    }

    /// Reads every remaining frame and sums their summaries.
    ///
    /// # Errors
    ///
    /// Returns the first decode error.
    pub fn summarize(self) -> Result<StreamSummary> {
        let mut summary = StreamSummary::default();
        for block in self {
            summary.blocks += 1;
            summary.range.merge(&block?.summary());
        }
        Ok(summary)
    }
}

impl<R: Read> Iterator for BlockReader<R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Lazily groups samples into blocks of at most `sample_count`.
#[derive(Debug)]
pub struct Blocks<I> {
    samples: I,
    sample_count: usize,
}

/// Returns an iterator that packs `samples` into blocks on demand.
///
/// A `sample_count` of zero is treated as one.
pub fn blocks<I>(samples: I, sample_count: usize) -> Blocks<I::IntoIter>
where
    I: IntoIterator<Item = Sample>,
{
    Blocks {
        samples: samples.into_iter(),
        sample_count: sample_count.max(1),
    }
}

impl<I: Iterator<Item = Sample>> Iterator for Blocks<I> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let chunk: Vec<Sample> = self.samples.by_ref().take(self.sample_count).collect();
        (!chunk.is_empty()).then(|| Block::new(chunk))
    }
}

/// Block and sample totals of a whole stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    /// Number of frames
    pub blocks: usize,
    /// Combined sample count and time range
    #[serde(flatten)]
    pub range: BlockSummary,
}

fn u32_at(buf: &[u8; HEADER_LEN], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

/// Reads until `buf` is full or the stream ends, returning the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

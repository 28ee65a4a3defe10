//! Heads file: the checkpointed list of series that were active in memory.
//!
//! Layout:
//!
//! ```text
//! magic            15 bytes  "PrometheusHeads"
//! format version   varint
//! record count     u64 big-endian
//! record * count:
//!   flags              1 byte (not interpreted)
//!   fingerprint        u64 big-endian
//!   metric             label pair count + pairs
//!   chunk watermark    varint   (format version 2)
//!   modification time  varint   (format version 2)
//!   chunk descs offset varint
//!   saved first time   varint
//!   descriptor count   varint
//!   descriptor * count: first time varint, last time varint
//! ```
//!
//! Descriptors at or beyond the watermark describe chunks that were never persisted; their
//! layout is not decoded and the parse fails when one is reached.

use crate::cursor::{write_u64_be, ByteCursor};
use crate::error::{Error, FormatError};
use crate::structural::{read_fingerprint, read_metric, write_metric};
use crate::types::{Fingerprint, Metric};
use crate::varint::{read_length, read_varint, write_varint};

use serde::{Deserialize, Serialize};

pub const HEADS_MAGIC: &[u8; 15] = b"PrometheusHeads";
pub const HEADS_FORMAT_LEGACY_VERSION: i64 = 1;
pub const HEADS_FORMAT_VERSION: i64 = 2;

// flags + fingerprint + empty metric + five single-byte varints.
const MIN_RECORD_LEN: usize = 1 + 8 + 1 + 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadsHeader {
    pub version: i64,
    pub record_count: u64,
}

/// Time range of one chunk of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub first_time: i64,
    pub last_time: i64,
}

/// One series entry of the heads file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRecord {
    /// Raw flags byte, kept as read.
    pub flags: u8,
    pub fingerprint: Fingerprint,
    pub metric: Metric,
    /// Number of chunks persisted at checkpoint time.
    pub chunk_watermark: i64,
    pub modification_time: i64,
    pub chunk_descs_offset: i64,
    pub saved_first_time: i64,
    pub chunk_descriptors: Vec<ChunkDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadsFile {
    pub header: HeadsHeader,
    pub records: Vec<SeriesRecord>,
}

/// Streaming parser over an in-memory heads file.
///
/// Construction reads the header; iteration yields one record at a time in file order. The
/// first error ends iteration.
#[derive(Debug)]
pub struct HeadsParser<'a> {
    cur: ByteCursor<'a>,
    header: HeadsHeader,
    remaining: u64,
    failed: bool,
}

impl<'a> HeadsParser<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self, Error> {
        let mut cur = ByteCursor::new(buf);
        let magic = cur.read_bytes(HEADS_MAGIC.len()).map_err(|_| FormatError::BadMagic {
            found: buf[..buf.len().min(HEADS_MAGIC.len())].to_vec(),
        })?;
        if magic != HEADS_MAGIC {
            return Err(FormatError::BadMagic {
                found: magic.to_vec(),
            }
            .into());
        }
        let version = read_varint(&mut cur)?;
        if version != HEADS_FORMAT_LEGACY_VERSION && version != HEADS_FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(version).into());
        }
        let record_count = cur.read_u64_be()?;
        Ok(Self {
            cur,
            header: HeadsHeader {
                version,
                record_count,
            },
            remaining: record_count,
            failed: false,
        })
    }

    pub fn header(&self) -> HeadsHeader {
        self.header
    }

    /// Byte offset of the next unread field.
    pub fn position(&self) -> usize {
        self.cur.position()
    }

    /// Records not yet read.
    pub fn records_remaining(&self) -> u64 {
        self.remaining
    }

    fn read_record(&mut self) -> Result<SeriesRecord, Error> {
        let cur = &mut self.cur;
        let flags = cur.read_u8()?;
        let fingerprint = read_fingerprint(cur)?;
        let metric = read_metric(cur)?;
        if self.header.version == HEADS_FORMAT_LEGACY_VERSION {
            return Err(FormatError::LegacyHeadsFormat.into());
        }
        let chunk_watermark = read_varint(cur)?;
        let modification_time = read_varint(cur)?;
        let chunk_descs_offset = read_varint(cur)?;
        let saved_first_time = read_varint(cur)?;
        let descriptor_count = read_length(cur)?;

        // Every descriptor takes at least two bytes.
        let mut chunk_descriptors = Vec::with_capacity(descriptor_count.min(cur.remaining() / 2));
        for index in 0..descriptor_count {
            let index = index as i64;
            if index >= chunk_watermark {
                return Err(FormatError::UnpersistedChunk {
                    fingerprint,
                    index,
                    watermark: chunk_watermark,
                }
                .into());
            }
            let first_time = read_varint(cur)?;
            let last_time = read_varint(cur)?;
            chunk_descriptors.push(ChunkDescriptor {
                first_time,
                last_time,
            });
        }

        Ok(SeriesRecord {
            flags,
            fingerprint,
            metric,
            chunk_watermark,
            modification_time,
            chunk_descs_offset,
            saved_first_time,
            chunk_descriptors,
        })
    }

    /// Ends parsing. With `require_full_consumption`, bytes left after the last record are an
    /// error.
    pub fn finish(self, require_full_consumption: bool) -> Result<(), Error> {
        if require_full_consumption && !self.cur.is_exhausted() {
            return Err(FormatError::TrailingBytes {
                pos: self.cur.position(),
                len: self.cur.remaining(),
            }
            .into());
        }
        Ok(())
    }
}

impl Iterator for HeadsParser<'_> {
    type Item = Result<SeriesRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        match self.read_record() {
            Ok(record) => {
                self.remaining -= 1;
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        (0, usize::try_from(self.remaining).ok())
    }
}

/// Parses a whole heads file held in memory.
pub fn parse_heads(buf: &[u8], require_full_consumption: bool) -> Result<HeadsFile, Error> {
    let mut parser = HeadsParser::new(buf)?;
    let header = parser.header();
    // The count comes from the file; never reserve more than the bytes could hold.
    let capacity = usize::try_from(header.record_count)
        .unwrap_or(usize::MAX)
        .min(buf.len() / MIN_RECORD_LEN);
    let mut records = Vec::with_capacity(capacity);
    for record in parser.by_ref() {
        records.push(record?);
    }
    parser.finish(require_full_consumption)?;
    Ok(HeadsFile { header, records })
}

/// Writes a heads file header.
pub fn write_heads_header(buf: &mut Vec<u8>, version: i64, record_count: u64) {
    buf.extend_from_slice(HEADS_MAGIC);
    write_varint(buf, version);
    write_u64_be(buf, record_count);
}

/// Writes one format-version-2 record. Metric labels are written in sorted name order.
pub fn write_series_record(buf: &mut Vec<u8>, record: &SeriesRecord) {
    buf.push(record.flags);
    write_u64_be(buf, record.fingerprint);
    let mut pairs: Vec<(&str, &str)> = record
        .metric
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    pairs.sort_unstable();
    write_metric(buf, pairs);
    write_varint(buf, record.chunk_watermark);
    write_varint(buf, record.modification_time);
    write_varint(buf, record.chunk_descs_offset);
    write_varint(buf, record.saved_first_time);
    write_varint(buf, record.chunk_descriptors.len() as i64);
    for d in &record.chunk_descriptors {
        write_varint(buf, d.first_time);
        write_varint(buf, d.last_time);
    }
}

/// Encodes a complete format-version-2 heads file.
pub fn encode_heads(records: &[SeriesRecord]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_heads_header(&mut buf, HEADS_FORMAT_VERSION, records.len() as u64);
    for r in records {
        write_series_record(&mut buf, r);
    }
    buf
}

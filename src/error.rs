use thiserror::Error;

use crate::types::Fingerprint;

/// Failure while decoding a primitive or structural value from raw bytes.
///
/// Positions are byte offsets into the buffer being decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Varint too long at offset {pos}")]
    VarintTooLong { pos: usize },

    #[error("Unexpected end of buffer at offset {pos}: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        pos: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("Invalid UTF-8 in string at offset {pos}: {source}")]
    InvalidUtf8 {
        pos: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Negative length {len} at offset {pos}")]
    NegativeLength { pos: usize, len: i64 },
}

/// Structural violation of the heads file layout. Fatal to the whole parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Bad magic: {found:?}")]
    BadMagic { found: Vec<u8> },

    #[error("Unimplemented: old heads db (format version 1)")]
    LegacyHeadsFormat,

    #[error("Unsupported heads format version {0}")]
    UnsupportedVersion(i64),

    #[error("Unimplemented: unpersisted chunk {index} of series {fingerprint:016x} (watermark {watermark})")]
    UnpersistedChunk {
        fingerprint: Fingerprint,
        index: i64,
        watermark: i64,
    },

    #[error("{len} trailing bytes after last record at offset {pos}")]
    TrailingBytes { pos: usize, len: usize },
}

/// Error type for all reader operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Decode Error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Format Error: {0}")]
    Format(#[from] FormatError),

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the external ordered key/value store.
    #[error("Store Error: {0}")]
    Store(String),

    /// A metric passed to presentation has no `__name__` label.
    #[error("Metric has no __name__ label")]
    MissingMetricName,

    #[error("Configuration Error: {0}")]
    Config(String),
}

#![doc = include_str!("../README.md")]
// Declare modules
pub mod core;
pub mod cursor;
pub mod error;
pub mod format;
pub mod heads;
pub mod index;
pub mod store;
pub mod strings;
pub mod structural;
pub mod telemetry;
pub mod types;
pub mod varint;

/// Configuration options for reading a storage directory.
pub use crate::core::ReaderConfig;
/// Main entry point for reading a local storage directory.
pub use crate::core::LocalStorage;
/// Byte buffer plus read position shared by all decoders.
pub use crate::cursor::ByteCursor;
/// Error types for decoding and reading.
pub use crate::error::{DecodeError, Error, FormatError};
/// Canonical `name{label="value"}` rendering.
pub use crate::format::stringify;
/// Heads file records and parser.
pub use crate::heads::{parse_heads, ChunkDescriptor, HeadsFile, HeadsHeader, HeadsParser, SeriesRecord};
/// Index table readers.
pub use crate::index::{
    FingerprintMetricReader, IndexReader, LabelNameValuesReader, LabelPairFingerprintsReader, Table,
};
/// Ordered key/value store abstraction.
pub use crate::store::{MemoryStore, OrderedStore, ScanOptions};
/// Structured event hook for observability.
pub use crate::telemetry::{DecodeEvent, DecodeEventListener};
/// Fingerprint, label pair and label set types.
pub use crate::types::{Fingerprint, FingerprintList, LabelPair, LabelValueList, Metric};

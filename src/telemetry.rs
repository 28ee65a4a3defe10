use std::path::PathBuf;
use std::sync::Arc;

use crate::index::Table;

/// Structured, in-process event hook for observability.
///
/// This crate is a library; emitting logs directly (e.g. `println!`) is not acceptable.
/// Callers provide an implementation that forwards these events to `tracing`, `log`, or a
/// custom sink.
pub trait DecodeEventListener: std::fmt::Debug + Send + Sync + 'static {
    fn on_event(&self, event: DecodeEvent);
}

/// Structured events emitted by the readers.
#[derive(Debug, Clone)]
pub enum DecodeEvent {
    HeadsFileLoaded { path: PathBuf, bytes: u64 },
    HeadsParsed { version: i64, records: u64 },
    HeadsParseFailed { error: String },

    IndexScanStarted { table: Table },
    IndexScanFinished { table: Table, pairs: u64 },
    IndexScanFailed { table: Table, error: String },
}

#[derive(Debug)]
pub struct NoopEventListener;

impl DecodeEventListener for NoopEventListener {
    #[inline]
    fn on_event(&self, _event: DecodeEvent) {}
}

pub fn noop_event_listener() -> Arc<dyn DecodeEventListener> {
    Arc::new(NoopEventListener)
}

/// Counters recorded through the `metrics` facade.
///
/// Recording is a no-op until the host process installs a recorder; call
/// [`decode_metrics::describe_all`] after installing one to attach units and help text.
pub mod decode_metrics {
    use ::metrics::{describe_counter, Unit};

    use crate::index::Table;

    pub const HEADS_RECORDS_DECODED: &str = "promlocal_heads_records_decoded";
    pub const HEADS_BYTES_READ: &str = "promlocal_heads_bytes_read";
    pub const INDEX_PAIRS_DECODED: &str = "promlocal_index_pairs_decoded";
    pub const DECODE_FAILURES: &str = "promlocal_decode_failures";

    #[inline]
    pub fn record_heads_bytes_read(bytes: u64) {
        if bytes > 0 {
            ::metrics::counter!(HEADS_BYTES_READ).increment(bytes);
        }
    }

    #[inline]
    pub fn record_heads_records(records: u64) {
        if records > 0 {
            ::metrics::counter!(HEADS_RECORDS_DECODED).increment(records);
        }
    }

    #[inline]
    pub fn record_index_pairs(table: Table, pairs: u64) {
        if pairs > 0 {
            ::metrics::counter!(INDEX_PAIRS_DECODED, "table" => table.name()).increment(pairs);
        }
    }

    #[inline]
    pub fn record_decode_failure(source: &'static str) {
        ::metrics::counter!(DECODE_FAILURES, "source" => source).increment(1);
    }

    pub fn describe_all() {
        describe_counter!(
            HEADS_RECORDS_DECODED,
            Unit::Count,
            "Series records decoded from heads files."
        );
        describe_counter!(
            HEADS_BYTES_READ,
            Unit::Bytes,
            "Bytes of heads files loaded into memory for parsing."
        );
        describe_counter!(
            INDEX_PAIRS_DECODED,
            Unit::Count,
            "Key/value pairs decoded from index tables, by table."
        );
        describe_counter!(
            DECODE_FAILURES,
            Unit::Count,
            "Fatal decode failures, by source (heads or table name)."
        );
    }
}

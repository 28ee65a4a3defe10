//! Readers for the three persisted index tables.
//!
//! Each table is a set of opaque key/value byte pairs in an external ordered store. A reader
//! scans a key range and decodes every pair lazily; the first pair that fails to decode ends
//! the scan with an error.

use crate::cursor::{write_u64_be, ByteCursor};
use crate::error::{DecodeError, Error};
use crate::store::{OrderedStore, RawScan, ScanOptions};
use crate::strings::{encode_string, read_string};
use crate::structural::{
    encode_label_pair, read_fingerprint, read_fingerprints, read_label_pair, read_label_values,
    read_metric,
};
use crate::telemetry::{decode_metrics, noop_event_listener, DecodeEvent, DecodeEventListener};
use crate::types::{Fingerprint, FingerprintList, LabelPair, LabelValueList, Metric};

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// The persisted index tables, named as on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    ArchivedFingerprintToMetric,
    LabelPairToFingerprints,
    LabelNameToLabelValues,
}

impl Table {
    pub const ALL: [Table; 3] = [
        Table::ArchivedFingerprintToMetric,
        Table::LabelPairToFingerprints,
        Table::LabelNameToLabelValues,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::ArchivedFingerprintToMetric => "archived_fingerprint_to_metric",
            Table::LabelPairToFingerprints => "labelpair_to_fingerprints",
            Table::LabelNameToLabelValues => "labelname_to_labelvalues",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key and value layout of one index table.
pub trait IndexTable {
    const TABLE: Table;
    type Key;
    type Value;

    fn decode_key(key: &[u8]) -> Result<Self::Key, DecodeError>;
    fn decode_value(value: &[u8]) -> Result<Self::Value, DecodeError>;
}

/// Fingerprint (8 bytes, big-endian) -> metric.
#[derive(Debug)]
pub struct ArchivedFingerprintToMetric;

/// Label pair -> fingerprints of every series carrying it.
#[derive(Debug)]
pub struct LabelPairToFingerprints;

/// Label name -> every value seen for it.
#[derive(Debug)]
pub struct LabelNameToLabelValues;

impl IndexTable for ArchivedFingerprintToMetric {
    const TABLE: Table = Table::ArchivedFingerprintToMetric;
    type Key = Fingerprint;
    type Value = Metric;

    fn decode_key(key: &[u8]) -> Result<Fingerprint, DecodeError> {
        read_fingerprint(&mut ByteCursor::new(key))
    }

    fn decode_value(value: &[u8]) -> Result<Metric, DecodeError> {
        read_metric(&mut ByteCursor::new(value))
    }
}

impl IndexTable for LabelPairToFingerprints {
    const TABLE: Table = Table::LabelPairToFingerprints;
    type Key = LabelPair;
    type Value = FingerprintList;

    fn decode_key(key: &[u8]) -> Result<LabelPair, DecodeError> {
        read_label_pair(&mut ByteCursor::new(key))
    }

    fn decode_value(value: &[u8]) -> Result<FingerprintList, DecodeError> {
        read_fingerprints(&mut ByteCursor::new(value))
    }
}

impl IndexTable for LabelNameToLabelValues {
    const TABLE: Table = Table::LabelNameToLabelValues;
    type Key = String;
    type Value = LabelValueList;

    fn decode_key(key: &[u8]) -> Result<String, DecodeError> {
        read_string(&mut ByteCursor::new(key))
    }

    fn decode_value(value: &[u8]) -> Result<LabelValueList, DecodeError> {
        read_label_values(&mut ByteCursor::new(value))
    }
}

pub type FingerprintMetricReader<S> = IndexReader<S, ArchivedFingerprintToMetric>;
pub type LabelPairFingerprintsReader<S> = IndexReader<S, LabelPairToFingerprints>;
pub type LabelNameValuesReader<S> = IndexReader<S, LabelNameToLabelValues>;

/// Decoding adapter over one table of an ordered store.
///
/// Scans are independent: every call to [`IndexReader::scan`] opens a fresh range scan.
#[derive(Debug)]
pub struct IndexReader<S, T> {
    store: S,
    listener: Arc<dyn DecodeEventListener>,
    _table: PhantomData<fn() -> T>,
}

impl<S: OrderedStore, T: IndexTable> IndexReader<S, T> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            listener: noop_event_listener(),
            _table: PhantomData,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn DecodeEventListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn table(&self) -> Table {
        T::TABLE
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Opens a range scan and returns the decoded pairs in the store's key order.
    pub fn scan(&self, options: &ScanOptions) -> Result<IndexScan<'_, T>, Error> {
        self.listener
            .on_event(DecodeEvent::IndexScanStarted { table: T::TABLE });
        let inner = self.store.scan(options).map_err(|e| {
            decode_metrics::record_decode_failure(T::TABLE.name());
            self.listener.on_event(DecodeEvent::IndexScanFailed {
                table: T::TABLE,
                error: e.to_string(),
            });
            e
        })?;
        Ok(IndexScan {
            inner,
            listener: Arc::clone(&self.listener),
            pairs: 0,
            done: false,
            _table: PhantomData,
        })
    }

    /// Decodes the entry stored under exactly `key`, if any.
    fn get_raw(&self, key: Vec<u8>) -> Result<Option<T::Value>, Error> {
        let options = ScanOptions::all().from_key(key.clone()).through_key(key);
        match self.scan(&options)?.next() {
            Some(entry) => entry.map(|(_, v)| Some(v)),
            None => Ok(None),
        }
    }
}

impl<S: OrderedStore> IndexReader<S, ArchivedFingerprintToMetric> {
    /// Looks up the archived metric of one series.
    pub fn get(&self, fingerprint: Fingerprint) -> Result<Option<Metric>, Error> {
        let mut key = Vec::with_capacity(8);
        write_u64_be(&mut key, fingerprint);
        self.get_raw(key)
    }
}

impl<S: OrderedStore> IndexReader<S, LabelPairToFingerprints> {
    /// Fingerprints of every series carrying `pair`.
    pub fn get(&self, pair: &LabelPair) -> Result<Option<FingerprintList>, Error> {
        self.get_raw(encode_label_pair(pair))
    }

    /// Rebuilds each series' label set by inverting the label pair index.
    ///
    /// Only pairs inside the scan range contribute, so a partial range yields partial metrics.
    pub fn metrics_by_fingerprint(
        &self,
        options: &ScanOptions,
    ) -> Result<BTreeMap<Fingerprint, Metric>, Error> {
        let mut out: BTreeMap<Fingerprint, Metric> = BTreeMap::new();
        for entry in self.scan(options)? {
            let (pair, fingerprints) = entry?;
            for fp in fingerprints {
                out.entry(fp)
                    .or_default()
                    .insert(pair.name.clone(), pair.value.clone());
            }
        }
        Ok(out)
    }
}

impl<S: OrderedStore> IndexReader<S, LabelNameToLabelValues> {
    /// Every known value of the label `name`.
    pub fn get(&self, name: &str) -> Result<Option<LabelValueList>, Error> {
        self.get_raw(encode_string(name))
    }
}

/// Lazy, forward-only sequence of decoded pairs from one scan.
///
/// After the first error the scan is finished and yields nothing further.
pub struct IndexScan<'a, T: IndexTable> {
    inner: RawScan<'a>,
    listener: Arc<dyn DecodeEventListener>,
    pairs: u64,
    done: bool,
    _table: PhantomData<fn() -> T>,
}

impl<T: IndexTable> fmt::Debug for IndexScan<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexScan")
            .field("table", &T::TABLE)
            .field("pairs", &self.pairs)
            .field("done", &self.done)
            .finish()
    }
}

impl<T: IndexTable> IndexScan<'_, T> {
    /// Pairs decoded so far.
    pub fn pairs_decoded(&self) -> u64 {
        self.pairs
    }

    fn fail(&mut self, error: Error) -> Option<Result<(T::Key, T::Value), Error>> {
        self.done = true;
        decode_metrics::record_decode_failure(T::TABLE.name());
        self.listener.on_event(DecodeEvent::IndexScanFailed {
            table: T::TABLE,
            error: error.to_string(),
        });
        Some(Err(error))
    }
}

impl<T: IndexTable> Iterator for IndexScan<'_, T> {
    type Item = Result<(T::Key, T::Value), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            None => {
                self.done = true;
                self.listener.on_event(DecodeEvent::IndexScanFinished {
                    table: T::TABLE,
                    pairs: self.pairs,
                });
                None
            }
            Some(Err(e)) => self.fail(e),
            Some(Ok((key, value))) => {
                let decoded = T::decode_key(&key).and_then(|k| Ok((k, T::decode_value(&value)?)));
                match decoded {
                    Ok(pair) => {
                        self.pairs += 1;
                        decode_metrics::record_index_pairs(T::TABLE, 1);
                        Some(Ok(pair))
                    }
                    Err(e) => self.fail(e.into()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::structural::{encode_fingerprints, encode_label_values, encode_metric};
    use crate::telemetry::test_support::RecordingListener;

    fn metric(pairs: &[(&str, &str)]) -> Metric {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fp_key(fp: Fingerprint) -> Vec<u8> {
        fp.to_be_bytes().to_vec()
    }

    fn archived_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert(fp_key(3), encode_metric(&metric(&[("__name__", "c")])));
        store.insert(fp_key(1), encode_metric(&metric(&[("__name__", "a")])));
        store.insert(
            fp_key(0x0100),
            encode_metric(&metric(&[("__name__", "big"), ("job", "x")])),
        );
        store
    }

    #[test]
    fn fingerprint_scan_follows_key_order() {
        let reader = FingerprintMetricReader::new(archived_store());
        let fps: Vec<Fingerprint> = reader
            .scan(&ScanOptions::all())
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(fps, vec![1, 3, 0x0100]);

        let rev: Vec<Fingerprint> = reader
            .scan(&ScanOptions::all().reversed())
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(rev, vec![0x0100, 3, 1]);
    }

    #[test]
    fn scan_is_restartable_with_new_options() {
        let reader = FingerprintMetricReader::new(archived_store());
        let first = reader.scan(&ScanOptions::all()).unwrap().next().unwrap().unwrap();
        assert_eq!(first.0, 1);
        let from_three: Vec<_> = reader
            .scan(&ScanOptions::all().from_key(fp_key(3)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(from_three.len(), 2);
        assert_eq!(from_three[0].1["__name__"], "c");
    }

    #[test]
    fn point_lookups() {
        let reader = FingerprintMetricReader::new(archived_store());
        assert_eq!(reader.get(0x0100).unwrap().unwrap()["job"], "x");
        assert!(reader.get(2).unwrap().is_none());

        let mut store = MemoryStore::new();
        store.insert(encode_string("job"), encode_label_values(&["api", "db"]));
        let names = LabelNameValuesReader::new(store);
        assert_eq!(
            names.get("job").unwrap(),
            Some(vec!["api".to_string(), "db".to_string()])
        );
        assert_eq!(names.get("instance").unwrap(), None);
    }

    #[test]
    fn decode_failure_ends_scan() {
        let mut store = archived_store();
        // Sorts between fingerprints 1 and 3; the metric claims a pair it does not contain.
        store.insert(fp_key(2), vec![0x02]);
        let listener = Arc::new(RecordingListener::default());
        let reader = FingerprintMetricReader::new(store).with_listener(listener.clone());
        let results: Vec<_> = reader.scan(&ScanOptions::all()).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(Error::Decode(DecodeError::UnexpectedEof { .. }))
        ));

        let events = listener.events.lock().unwrap();
        assert!(matches!(
            events.first(),
            Some(DecodeEvent::IndexScanStarted {
                table: Table::ArchivedFingerprintToMetric
            })
        ));
        assert!(matches!(
            events.last(),
            Some(DecodeEvent::IndexScanFailed { .. })
        ));
    }

    #[test]
    fn finished_event_reports_pair_count() {
        let listener = Arc::new(RecordingListener::default());
        let reader = FingerprintMetricReader::new(archived_store()).with_listener(listener.clone());
        let mut scan = reader.scan(&ScanOptions::all()).unwrap();
        while let Some(r) = scan.next() {
            r.unwrap();
        }
        assert_eq!(scan.pairs_decoded(), 3);
        assert!(scan.next().is_none());
        let events = listener.events.lock().unwrap();
        let finished: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, DecodeEvent::IndexScanFinished { pairs: 3, .. }))
            .collect();
        assert_eq!(finished.len(), 1);
    }

    #[test]
    fn label_pair_index_inverts_to_metrics() {
        let mut store = MemoryStore::new();
        let entries = [
            (LabelPair::new("__name__", "up"), vec![10u64, 20]),
            (LabelPair::new("job", "api"), vec![10]),
            (LabelPair::new("job", "db"), vec![20]),
        ];
        for (pair, fps) in &entries {
            store.insert(encode_label_pair(pair), encode_fingerprints(fps));
        }
        let reader = LabelPairFingerprintsReader::new(store);
        assert_eq!(reader.table(), Table::LabelPairToFingerprints);
        assert_eq!(reader.store().len(), 3);
        assert_eq!(
            reader.get(&LabelPair::new("job", "db")).unwrap(),
            Some(vec![20])
        );

        let by_fp = reader.metrics_by_fingerprint(&ScanOptions::all()).unwrap();
        assert_eq!(by_fp.len(), 2);
        assert_eq!(by_fp[&10], metric(&[("__name__", "up"), ("job", "api")]));
        assert_eq!(by_fp[&20], metric(&[("__name__", "up"), ("job", "db")]));
    }

    #[test]
    fn table_names_match_on_disk_directories() {
        let names: Vec<_> = Table::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "archived_fingerprint_to_metric",
                "labelpair_to_fingerprints",
                "labelname_to_labelvalues"
            ]
        );
    }
}

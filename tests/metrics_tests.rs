//! Decode counters as seen through an installed Prometheus recorder.
//!
//! The recorder is process-global, so every assertion compares before/after deltas and the whole
//! flow runs in one test.

use std::sync::{Arc, Mutex, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tempfile::TempDir;

use promlocal::heads::{encode_heads, ChunkDescriptor, SeriesRecord};
use promlocal::structural::encode_metric;
use promlocal::telemetry::decode_metrics;
use promlocal::{
    DecodeEvent, DecodeEventListener, Error, FingerprintMetricReader, FormatError, LocalStorage,
    MemoryStore, Metric, ReaderConfig, ScanOptions,
};

fn install_prometheus_once() -> &'static PrometheusHandle {
    static PROM: OnceLock<PrometheusHandle> = OnceLock::new();
    PROM.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install in-process prometheus recorder");
        decode_metrics::describe_all();
        handle
    })
}

fn parse_sample(rendered: &str, metric: &str) -> Option<f64> {
    for line in rendered.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, val) = match line.rsplit_once(' ') {
            Some(kv) => kv,
            None => continue,
        };
        // Exact name, or exact name plus label set.
        if key == metric || key.starts_with(metric) && key.as_bytes().get(metric.len()).copied() == Some(b'{') {
            if let Ok(v) = val.parse::<f64>() {
                return Some(v);
            }
        }
    }
    None
}

fn parse_counter(rendered: &str, base_name: &str) -> f64 {
    parse_sample(rendered, &format!("{}_total", base_name))
        .or_else(|| parse_sample(rendered, base_name))
        .unwrap_or(0.0)
}

/// Counter value for a single-label series such as `name{table="..."}`.
fn parse_labelled_counter(rendered: &str, base_name: &str, label: &str, value: &str) -> f64 {
    let selector = format!("{{{}=\"{}\"}}", label, value);
    parse_sample(rendered, &format!("{}_total{}", base_name, selector))
        .or_else(|| parse_sample(rendered, &format!("{}{}", base_name, selector)))
        .unwrap_or(0.0)
}

fn extract_promlocal_lines(rendered: &str) -> String {
    rendered
        .lines()
        .filter(|l| l.contains("promlocal_"))
        .take(200)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Default)]
struct CollectingListener {
    events: Mutex<Vec<DecodeEvent>>,
}

impl DecodeEventListener for CollectingListener {
    fn on_event(&self, event: DecodeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn record(fingerprint: u64, name: &str) -> SeriesRecord {
    let mut metric = Metric::new();
    metric.insert("__name__".to_string(), name.to_string());
    metric.insert("job".to_string(), "api".to_string());
    SeriesRecord {
        flags: 0,
        fingerprint,
        metric,
        chunk_watermark: 1,
        modification_time: 5,
        chunk_descs_offset: 0,
        saved_first_time: 0,
        chunk_descriptors: vec![ChunkDescriptor {
            first_time: 0,
            last_time: 1,
        }],
    }
}

#[test]
fn emits_heads_index_and_failure_metrics() {
    let prom = install_prometheus_once();

    let before = prom.render();
    let before_records = parse_counter(&before, decode_metrics::HEADS_RECORDS_DECODED);
    let before_bytes = parse_counter(&before, decode_metrics::HEADS_BYTES_READ);
    let before_pairs = parse_labelled_counter(
        &before,
        decode_metrics::INDEX_PAIRS_DECODED,
        "table",
        "archived_fingerprint_to_metric",
    );
    let before_failures =
        parse_labelled_counter(&before, decode_metrics::DECODE_FAILURES, "source", "heads");

    // Heads file on disk: three records.
    let dir = TempDir::new().expect("tempdir");
    let buf = encode_heads(&[record(1, "up"), record(2, "up"), record(3, "down")]);
    std::fs::write(dir.path().join("heads.db"), &buf).expect("write heads");
    let heads = LocalStorage::open(dir.path()).read_heads().expect("read heads");
    assert_eq!(heads.records.len(), 3);

    // Archived table scan: four pairs.
    let store: MemoryStore = (10u64..14)
        .map(|fp| (fp.to_be_bytes().to_vec(), encode_metric(&record(fp, "up").metric)))
        .collect();
    let scanned = FingerprintMetricReader::new(&store)
        .scan(&ScanOptions::all())
        .expect("scan")
        .collect::<Result<Vec<_>, _>>()
        .expect("decode");
    assert_eq!(scanned.len(), 4);

    // Corrupt heads file: failure counter plus event.
    let bad = dir.path().join("bad.db");
    let mut corrupt = buf.clone();
    corrupt[0] = b'X';
    std::fs::write(&bad, &corrupt).expect("write bad heads");
    let listener = Arc::new(CollectingListener::default());
    let storage = LocalStorage::with_config(ReaderConfig {
        data_dir: dir.path().to_path_buf(),
        heads_file_name: "bad.db".to_string(),
        event_listener: listener.clone(),
        ..ReaderConfig::default()
    });
    assert!(matches!(
        storage.read_heads(),
        Err(Error::Format(FormatError::BadMagic { .. }))
    ));
    {
        let events = listener.events.lock().unwrap();
        assert!(
            matches!(events.last(), Some(DecodeEvent::HeadsParseFailed { error }) if error.contains("magic")),
            "events: {:?}",
            events
        );
    }

    let after = prom.render();
    let after_records = parse_counter(&after, decode_metrics::HEADS_RECORDS_DECODED);
    let after_bytes = parse_counter(&after, decode_metrics::HEADS_BYTES_READ);
    let after_pairs = parse_labelled_counter(
        &after,
        decode_metrics::INDEX_PAIRS_DECODED,
        "table",
        "archived_fingerprint_to_metric",
    );
    let after_failures =
        parse_labelled_counter(&after, decode_metrics::DECODE_FAILURES, "source", "heads");

    assert!(
        after_records >= before_records + 3.0,
        "expected heads records counter to increase by at least 3, before={}, after={}\n\nRendered promlocal_* metrics:\n{}",
        before_records,
        after_records,
        extract_promlocal_lines(&after)
    );

    // Both the good and the corrupt file were loaded.
    assert!(
        after_bytes >= before_bytes + 2.0 * buf.len() as f64,
        "expected heads bytes counter to increase by at least {}, before={}, after={}",
        2 * buf.len(),
        before_bytes,
        after_bytes
    );

    assert!(
        after_pairs >= before_pairs + 4.0,
        "expected archived table pair counter to increase by at least 4, before={}, after={}",
        before_pairs,
        after_pairs
    );

    assert!(
        after_failures >= before_failures + 1.0,
        "expected heads decode failure counter to increase, before={}, after={}",
        before_failures,
        after_failures
    );
}

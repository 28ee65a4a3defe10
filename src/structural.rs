//! Label pairs, metrics, fingerprint lists and label-value lists.
//!
//! All decoders are pure functions of (buffer, start position) and return the value together
//! with the position just past it. Counts are signed varints; fingerprints are fixed 8-byte
//! big-endian integers.

use crate::cursor::{write_u64_be, ByteCursor};
use crate::error::DecodeError;
use crate::strings::{read_string, write_string};
use crate::types::{Fingerprint, FingerprintList, LabelPair, LabelValueList, Metric};
use crate::varint::{read_length, write_varint};

// Smallest possible encodings, used to bound up-front allocations from untrusted counts.
const MIN_LABEL_PAIR_LEN: usize = 2;
const FINGERPRINT_LEN: usize = 8;
const MIN_STRING_LEN: usize = 1;

pub fn read_fingerprint(cur: &mut ByteCursor<'_>) -> Result<Fingerprint, DecodeError> {
    cur.read_u64_be()
}

pub fn read_label_pair(cur: &mut ByteCursor<'_>) -> Result<LabelPair, DecodeError> {
    let name = read_string(cur)?;
    let value = read_string(cur)?;
    Ok(LabelPair { name, value })
}

/// Reads a pair count followed by that many label pairs. A repeated label name keeps the
/// value that appears last.
pub fn read_metric(cur: &mut ByteCursor<'_>) -> Result<Metric, DecodeError> {
    let count = read_length(cur)?;
    let mut metric = Metric::with_capacity(count.min(cur.remaining() / MIN_LABEL_PAIR_LEN));
    for _ in 0..count {
        let LabelPair { name, value } = read_label_pair(cur)?;
        metric.insert(name, value);
    }
    Ok(metric)
}

pub fn read_fingerprints(cur: &mut ByteCursor<'_>) -> Result<FingerprintList, DecodeError> {
    let count = read_length(cur)?;
    let mut fps = Vec::with_capacity(count.min(cur.remaining() / FINGERPRINT_LEN));
    for _ in 0..count {
        fps.push(read_fingerprint(cur)?);
    }
    Ok(fps)
}

pub fn read_label_values(cur: &mut ByteCursor<'_>) -> Result<LabelValueList, DecodeError> {
    let count = read_length(cur)?;
    let mut values = Vec::with_capacity(count.min(cur.remaining() / MIN_STRING_LEN));
    for _ in 0..count {
        values.push(read_string(cur)?);
    }
    Ok(values)
}

fn decode_with<T>(
    buf: &[u8],
    pos: usize,
    read: impl FnOnce(&mut ByteCursor<'_>) -> Result<T, DecodeError>,
) -> Result<(T, usize), DecodeError> {
    let mut cur = ByteCursor::at(buf, pos);
    let v = read(&mut cur)?;
    Ok((v, cur.position()))
}

pub fn decode_fingerprint(buf: &[u8], pos: usize) -> Result<(Fingerprint, usize), DecodeError> {
    decode_with(buf, pos, read_fingerprint)
}

pub fn decode_label_pair(buf: &[u8], pos: usize) -> Result<(LabelPair, usize), DecodeError> {
    decode_with(buf, pos, read_label_pair)
}

pub fn decode_metric(buf: &[u8], pos: usize) -> Result<(Metric, usize), DecodeError> {
    decode_with(buf, pos, read_metric)
}

pub fn decode_fingerprints(
    buf: &[u8],
    pos: usize,
) -> Result<(FingerprintList, usize), DecodeError> {
    decode_with(buf, pos, read_fingerprints)
}

pub fn decode_label_values(
    buf: &[u8],
    pos: usize,
) -> Result<(LabelValueList, usize), DecodeError> {
    decode_with(buf, pos, read_label_values)
}

pub fn write_label_pair(buf: &mut Vec<u8>, name: &str, value: &str) {
    write_string(buf, name);
    write_string(buf, value);
}

/// Writes a metric from (name, value) pairs in the given order, duplicates included.
pub fn write_metric<'a, I>(buf: &mut Vec<u8>, pairs: I)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
    I::IntoIter: ExactSizeIterator,
{
    let pairs = pairs.into_iter();
    write_varint(buf, pairs.len() as i64);
    for (name, value) in pairs {
        write_label_pair(buf, name, value);
    }
}

pub fn encode_label_pair(pair: &LabelPair) -> Vec<u8> {
    let mut buf = Vec::new();
    write_label_pair(&mut buf, &pair.name, &pair.value);
    buf
}

/// Encodes a metric with its labels in sorted name order.
pub fn encode_metric(metric: &Metric) -> Vec<u8> {
    let mut pairs: Vec<(&str, &str)> = metric
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    pairs.sort_unstable();
    let mut buf = Vec::new();
    write_metric(&mut buf, pairs);
    buf
}

pub fn encode_fingerprints(fps: &[Fingerprint]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + fps.len() * FINGERPRINT_LEN);
    write_varint(&mut buf, fps.len() as i64);
    for fp in fps {
        write_u64_be(&mut buf, *fp);
    }
    buf
}

pub fn encode_label_values<S: AsRef<str>>(values: &[S]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_varint(&mut buf, values.len() as i64);
    for v in values {
        write_string(&mut buf, v.as_ref());
    }
    buf
}

//! Ordered key/value source behind the index readers.
//!
//! The engine kept its index tables in an external ordered store; the readers only need a
//! range scan over raw byte pairs. [`MemoryStore`] is an in-process implementation.

use crate::error::Error;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A raw (key, value) pair as returned by a scan.
pub type RawPair = (Vec<u8>, Vec<u8>);

/// Lazy sequence of raw pairs produced by one scan.
pub type RawScan<'a> = Box<dyn Iterator<Item = Result<RawPair, Error>> + 'a>;

/// Range and direction of a scan. Defaults to the whole table in ascending key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub start: Bound<Vec<u8>>,
    pub end: Bound<Vec<u8>>,
    pub reverse: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
            reverse: false,
        }
    }
}

impl ScanOptions {
    pub fn all() -> Self {
        Self::default()
    }

    /// Keys `>= key`.
    pub fn from_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.start = Bound::Included(key.into());
        self
    }

    /// Keys `> key`.
    pub fn after_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.start = Bound::Excluded(key.into());
        self
    }

    /// Keys `<= key`.
    pub fn through_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.end = Bound::Included(key.into());
        self
    }

    /// Keys `< key`.
    pub fn until_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.end = Bound::Excluded(key.into());
        self
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// True when no key can satisfy both bounds.
    pub fn is_empty_range(&self) -> bool {
        match (&self.start, &self.end) {
            (Bound::Included(s), Bound::Included(e)) => s > e,
            (Bound::Included(s), Bound::Excluded(e))
            | (Bound::Excluded(s), Bound::Included(e))
            | (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
            _ => false,
        }
    }

    fn as_ref_bounds(&self) -> (Bound<&[u8]>, Bound<&[u8]>) {
        (as_slice_bound(&self.start), as_slice_bound(&self.end))
    }
}

fn as_slice_bound(b: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match b {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Range-scan capability over an ordered byte-keyed table.
///
/// Implementations yield pairs in key order (descending when `reverse` is set). The returned
/// iterator owns whatever handle the scan needs and releases it when dropped.
pub trait OrderedStore {
    fn scan(&self, options: &ScanOptions) -> Result<RawScan<'_>, Error>;
}

impl<S: OrderedStore + ?Sized> OrderedStore for &S {
    fn scan(&self, options: &ScanOptions) -> Result<RawScan<'_>, Error> {
        (**self).scan(options)
    }
}

/// In-memory ordered table.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<RawPair> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = RawPair>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl OrderedStore for MemoryStore {
    fn scan(&self, options: &ScanOptions) -> Result<RawScan<'_>, Error> {
        // BTreeMap::range panics on inverted bounds.
        if options.is_empty_range() {
            return Ok(Box::new(std::iter::empty()));
        }
        let range = self
            .entries
            .range::<[u8], _>(options.as_ref_bounds())
            .map(|(k, v)| Ok((k.clone(), v.clone())));
        if options.reverse {
            Ok(Box::new(range.rev()))
        } else {
            Ok(Box::new(range))
        }
    }
}

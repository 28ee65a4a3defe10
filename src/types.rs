use std::collections::HashMap;

/// Stable 64-bit identity of a series. Stored as 8 big-endian bytes.
pub type Fingerprint = u64;

/// Label set of a series (label name -> label value).
pub type Metric = HashMap<String, String>;

/// Fingerprints of every series carrying a given label pair, in stored order.
pub type FingerprintList = Vec<Fingerprint>;

/// Known values of a label name, in stored order.
pub type LabelValueList = Vec<String>;

/// Reserved label holding the metric's base name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// A single `name="value"` label pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct LabelPair {
    pub name: String,
    pub value: String,
}

impl LabelPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

//! Text rendering of metrics as `name{label="value",...}`.

use crate::error::Error;
use crate::types::{Metric, METRIC_NAME_LABEL};

/// Renders a metric with its labels in sorted name order.
///
/// Values are wrapped in double quotes verbatim; embedded quotes are not escaped.
pub fn stringify(metric: &Metric) -> Result<String, Error> {
    let name = metric.get(METRIC_NAME_LABEL).ok_or(Error::MissingMetricName)?;
    let mut labels: Vec<(&String, &String)> = metric
        .iter()
        .filter(|(k, _)| k.as_str() != METRIC_NAME_LABEL)
        .collect();
    labels.sort_unstable();

    let mut out = String::with_capacity(name.len() + 2 + labels.len() * 16);
    out.push_str(name);
    out.push('{');
    for (i, (k, v)) in labels.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(v);
        out.push('"');
    }
    out.push('}');
    Ok(out)
}

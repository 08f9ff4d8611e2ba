//! Derived-value pipeline.
//!
//! A transformer is a stateful unit attached to one raw metric name. Each
//! time that metric is `set`, every attached transformer sees the raw
//! value and may emit derived `(name, value)` pairs that are written back
//! to the store alongside the raw value.
//!
//! - [`RateEstimator`]: per-second rate plus trailing one-minute figure
//!   from a partition-keyed monotonic counter.
//! - [`LagAggregator`]: min/max/mean/count over per-partition lag.
//! - [`WaitTimeEstimator`]: offset-interpolated consumer latency.

mod lag;
mod rate;
mod wait_time;

pub use lag::LagAggregator;
pub use rate::{CounterField, RateEstimator};
pub use wait_time::WaitTimeEstimator;

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// A stateful derived-value computation for one raw metric name.
///
/// `compute` is handed the raw value exactly as the monitor sent it plus
/// the receive timestamp, and returns the derived values to publish this
/// cycle (possibly none). Invocations for a given raw metric name are
/// serialized by the engine; implementations never lock.
pub trait Transformer: Send {
    fn compute(&mut self, raw: &Value, now_ms: u64) -> Vec<(String, Value)>;
}

/// One partition's counters inside a partition-keyed raw sample.
///
/// All fields are optional: each transformer picks the fields it needs
/// and skips partitions missing them. `commited` is accepted as an alias
/// because the deployed offsets monitor spells it that way.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartitionSample {
    pub tail: Option<f64>,
    #[serde(alias = "commited")]
    pub committed: Option<f64>,
    pub lag: Option<f64>,
    /// Sample time in seconds, if the monitor stamped it.
    pub timestamp: Option<f64>,
}

/// Decode a raw value as a partition-keyed sample map.
///
/// Returns `None` (with a warning) when the value is not shaped like
/// `{partition: {counters...}}`; callers fall back to their own
/// default/skip policy rather than failing the request.
pub(crate) fn parse_partitions(raw: &Value) -> Option<BTreeMap<String, PartitionSample>> {
    match serde_json::from_value(raw.clone()) {
        Ok(partitions) => Some(partitions),
        Err(e) => {
            warn!(error = %e, "raw value is not a partition-keyed sample");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_partition_map() {
        let raw = json!({
            "partition_0": {"tail": 1435, "commited": 1387, "lag": 48},
            "partition_1": {"tail": 1429, "committed": 1429, "lag": 0, "timestamp": 17.5},
        });
        let partitions = parse_partitions(&raw).expect("valid sample");
        assert_eq!(partitions.len(), 2);

        let p0 = &partitions["partition_0"];
        assert_eq!(p0.tail, Some(1435.0));
        assert_eq!(p0.committed, Some(1387.0), "commited alias must decode");
        assert_eq!(p0.lag, Some(48.0));
        assert_eq!(p0.timestamp, None);

        assert_eq!(partitions["partition_1"].timestamp, Some(17.5));
    }

    #[test]
    fn missing_counters_stay_none() {
        let raw = json!({"partition_0": {"lag": 3}});
        let partitions = parse_partitions(&raw).expect("valid sample");
        let p0 = &partitions["partition_0"];
        assert_eq!(p0.tail, None);
        assert_eq!(p0.committed, None);
    }

    #[test]
    fn scalar_is_not_a_partition_sample() {
        assert!(parse_partitions(&json!(42)).is_none());
        assert!(parse_partitions(&json!({"p0": "oops"})).is_none());
    }
}

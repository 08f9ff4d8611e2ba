//! Lag aggregation across partitions.

use serde_json::{json, Value};

use super::{parse_partitions, Transformer};

/// Pure min/max/mean/count over the per-partition `lag` field.
///
/// Holds no state between samples. Empty or malformed input yields zeroed
/// stats so the dashboard always has something to render.
pub struct LagAggregator {
    name: String,
}

impl LagAggregator {
    pub fn new(name: impl Into<String>) -> Self {
        LagAggregator { name: name.into() }
    }

    fn stats(&self, lags: &[f64]) -> Value {
        if lags.is_empty() {
            return json!({"min": 0.0, "max": 0.0, "mean": 0.0, "count": 0});
        }
        let min = lags.iter().copied().fold(f64::INFINITY, f64::min);
        let max = lags.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = lags.iter().sum::<f64>() / lags.len() as f64;
        json!({"min": min, "max": max, "mean": mean, "count": lags.len()})
    }
}

impl Transformer for LagAggregator {
    fn compute(&mut self, raw: &Value, _now_ms: u64) -> Vec<(String, Value)> {
        let lags: Vec<f64> = parse_partitions(raw)
            .map(|partitions| partitions.values().filter_map(|s| s.lag).collect())
            .unwrap_or_default();
        vec![(self.name.clone(), self.stats(&lags))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compute(raw: Value) -> Value {
        let mut agg = LagAggregator::new("lags");
        let mut out = agg.compute(&raw, 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, "lags");
        out.remove(0).1
    }

    #[test]
    fn empty_input_yields_zeroed_stats() {
        assert_eq!(
            compute(json!({})),
            json!({"min": 0.0, "max": 0.0, "mean": 0.0, "count": 0})
        );
    }

    #[test]
    fn aggregates_across_partitions() {
        let stats = compute(json!({
            "p0": {"lag": 5},
            "p1": {"lag": 15},
        }));
        assert_eq!(stats, json!({"min": 5.0, "max": 15.0, "mean": 10.0, "count": 2}));
    }

    #[test]
    fn partitions_without_lag_are_skipped() {
        let stats = compute(json!({
            "p0": {"lag": 8},
            "p1": {"tail": 100},
        }));
        assert_eq!(stats, json!({"min": 8.0, "max": 8.0, "mean": 8.0, "count": 1}));
    }

    #[test]
    fn malformed_input_yields_zeroed_stats() {
        assert_eq!(
            compute(json!("not partitions")),
            json!({"min": 0.0, "max": 0.0, "mean": 0.0, "count": 0})
        );
    }
}

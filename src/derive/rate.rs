//! Per-second rate estimation over a partition-keyed monotonic counter.

use serde_json::{json, Value};
use std::collections::VecDeque;
use tracing::debug;

use super::{parse_partitions, PartitionSample, Transformer};

/// Window over which the trailing one-minute rate is averaged.
const WINDOW_MS: u64 = 60_000;

/// Derives `{<name>, <name>_1min}` from a cumulative counter summed
/// across partitions.
///
/// The counter is assumed non-decreasing. A decreasing total (counter
/// reset) or a non-monotonic receive timestamp rebaselines the estimator
/// and emits zeros for the cycle instead of a negative rate. The first
/// sample is always a cold start.
///
/// The one-minute figure is the arithmetic mean of the instantaneous
/// rates retained in the window. Samples arrive at irregular intervals,
/// so a sum-over-60s variant would weight bursts of samples differently.
pub struct RateEstimator {
    name: String,
    field: CounterField,
    last: Option<(f64, u64)>,
    window: VecDeque<(u64, f64)>,
}

/// Which per-partition counter the estimator sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterField {
    Tail,
    Committed,
    Lag,
}

impl CounterField {
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            "tail" => Some(CounterField::Tail),
            // Deployed monitors spell it "commited"; accept both.
            "committed" | "commited" => Some(CounterField::Committed),
            "lag" => Some(CounterField::Lag),
            _ => None,
        }
    }

    fn of(&self, sample: &PartitionSample) -> Option<f64> {
        match self {
            CounterField::Tail => sample.tail,
            CounterField::Committed => sample.committed,
            CounterField::Lag => sample.lag,
        }
    }
}

impl RateEstimator {
    pub fn new(name: impl Into<String>, field: CounterField) -> Self {
        RateEstimator {
            name: name.into(),
            field,
            last: None,
            window: VecDeque::new(),
        }
    }

    fn emit(&self, instant: f64, one_minute: f64) -> Vec<(String, Value)> {
        vec![
            (self.name.clone(), json!(instant)),
            (format!("{}_1min", self.name), json!(one_minute)),
        ]
    }

    fn rebaseline(&mut self, total: f64, now_ms: u64) -> Vec<(String, Value)> {
        self.last = Some((total, now_ms));
        // A cold start discards history: retained rates predate the
        // anomaly, and their timestamps may sit ahead of the new baseline
        // after a backwards clock step.
        self.window.clear();
        self.emit(0.0, 0.0)
    }
}

impl Transformer for RateEstimator {
    fn compute(&mut self, raw: &Value, now_ms: u64) -> Vec<(String, Value)> {
        let partitions = match parse_partitions(raw) {
            Some(p) if !p.is_empty() => p,
            // Empty or malformed sample: zeroed stats, not an error.
            _ => return self.emit(0.0, 0.0),
        };

        let total: f64 = partitions.values().filter_map(|s| self.field.of(s)).sum();

        let (last_total, last_ms) = match self.last {
            None => return self.rebaseline(total, now_ms),
            Some(last) => last,
        };

        if now_ms <= last_ms || total < last_total {
            debug!(
                name = %self.name,
                total,
                last_total,
                "non-monotonic sample, cold-starting rate"
            );
            return self.rebaseline(total, now_ms);
        }

        let elapsed_secs = (now_ms - last_ms) as f64 / 1000.0;
        let instant = (total - last_total) / elapsed_secs;
        self.last = Some((total, now_ms));

        self.window.push_back((now_ms, instant));
        while self
            .window
            .front()
            .is_some_and(|&(t, _)| now_ms.saturating_sub(t) > WINDOW_MS)
        {
            self.window.pop_front();
        }
        let one_minute =
            self.window.iter().map(|&(_, r)| r).sum::<f64>() / self.window.len() as f64;

        self.emit(instant, one_minute)
    }
}

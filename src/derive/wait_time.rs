//! Offset-interpolated consumer wait-time estimation.
//!
//! Monitors only deliver coarse snapshots: "partition p was at produced
//! offset P and committed offset C at time t". To estimate how long an
//! individual record sat between being produced and being consumed, each
//! partition keeps two offset->timestamp series (produced and committed)
//! and linearly interpolates a timestamp for every integer offset between
//! consecutive snapshots. Wherever both series cover the same offset, the
//! difference of the two timestamps is that record's wait time.
//!
//! This is a continuously-running reconciliation: series state persists
//! across cycles, and processed offsets are trimmed away so memory stays
//! bounded by the not-yet-reconciled tail.

use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{parse_partitions, Transformer};

/// Offset jump above which interpolation is meaningless (topic recreated,
/// monitor pointed at a different partition set). The series restarts
/// from the new snapshot instead of densifying millions of entries.
const MAX_INTERPOLATION_SPAN: i64 = 1_000_000;

/// A densely-indexed offset->timestamp series.
///
/// `timestamps[i]` estimates when offset `start_offset + i` was recorded.
/// Snapshots extend the dense run by interpolating across the newest gap,
/// so offsets are strictly increasing by construction.
#[derive(Debug, Default)]
struct DenseSeries {
    start_offset: i64,
    timestamps: Vec<f64>,
}

enum Extend {
    Extended,
    /// Offset not strictly greater than the last recorded one.
    Dropped,
}

impl DenseSeries {
    fn len(&self) -> usize {
        self.timestamps.len()
    }

    fn first_offset(&self) -> Option<i64> {
        (!self.timestamps.is_empty()).then_some(self.start_offset)
    }

    fn last_offset(&self) -> Option<i64> {
        (!self.timestamps.is_empty()).then(|| self.start_offset + self.timestamps.len() as i64 - 1)
    }

    fn timestamp_at(&self, offset: i64) -> Option<f64> {
        let index = usize::try_from(offset.checked_sub(self.start_offset)?).ok()?;
        self.timestamps.get(index).copied()
    }

    fn reset_to(&mut self, offset: i64, ts: f64) {
        self.start_offset = offset;
        self.timestamps.clear();
        self.timestamps.push(ts);
    }

    /// Record a snapshot, interpolating timestamps for every offset in
    /// the gap since the previous one.
    fn extend(&mut self, offset: i64, ts: f64) -> Extend {
        let last = match self.last_offset() {
            None => {
                self.reset_to(offset, ts);
                return Extend::Extended;
            }
            Some(last) => last,
        };

        // Ill-defined interpolation range: drop the sample for this series.
        if offset <= last {
            return Extend::Dropped;
        }

        let gap = offset - last;
        if gap > MAX_INTERPOLATION_SPAN {
            warn!(gap, "offset jumped too far to interpolate, restarting series");
            self.reset_to(offset, ts);
            return Extend::Extended;
        }

        let last_ts = self.timestamps.last().copied().unwrap_or(ts);
        let step = (ts - last_ts) / gap as f64;
        for i in 1..=gap {
            self.timestamps.push(last_ts + step * i as f64);
        }
        Extend::Extended
    }

    /// Drop processed entries, retaining the entry at `offset` as the
    /// interpolation base for the next gap.
    fn trim_to(&mut self, offset: i64) {
        let drop = offset.saturating_sub(self.start_offset);
        if drop <= 0 {
            return;
        }
        let drop = (drop as usize).min(self.timestamps.len());
        self.timestamps.drain(..drop);
        self.start_offset += drop as i64;
    }
}

#[derive(Debug, Default)]
struct PartitionSeries {
    produced: DenseSeries,
    committed: DenseSeries,
    /// Highest offset already reconciled, so overlapping coverage is not
    /// counted twice across cycles.
    processed_through: Option<i64>,
}

/// Estimates the mean produce-to-consume latency per evaluation cycle.
///
/// Emits nothing for a cycle in which no partition had overlapping
/// produced/committed coverage (not enough history yet, or the consumer
/// has not advanced).
pub struct WaitTimeEstimator {
    name: String,
    partitions: HashMap<String, PartitionSeries>,
}

impl WaitTimeEstimator {
    pub fn new(name: impl Into<String>) -> Self {
        WaitTimeEstimator {
            name: name.into(),
            partitions: HashMap::new(),
        }
    }

    /// Reconcile one partition's snapshot, pushing per-record wait times
    /// for newly covered offsets into `deltas`.
    fn reconcile(series: &mut PartitionSeries, tail: i64, committed: i64, ts: f64, deltas: &mut Vec<f64>) {
        if let Extend::Dropped = series.produced.extend(tail, ts) {
            debug!(tail, "produced offset did not advance, sample dropped");
        }
        if let Extend::Dropped = series.committed.extend(committed, ts) {
            debug!(committed, "committed offset did not advance, sample dropped");
        }

        // Interpolation needs at least two snapshot points per series.
        if series.produced.len() < 2 || series.committed.len() < 2 {
            return;
        }

        let (Some(p_first), Some(p_last)) = (series.produced.first_offset(), series.produced.last_offset()) else {
            return;
        };
        let (Some(c_first), Some(c_last)) = (series.committed.first_offset(), series.committed.last_offset()) else {
            return;
        };

        let mut lo = p_first.max(c_first);
        let hi = p_last.min(c_last);
        if let Some(processed) = series.processed_through {
            lo = lo.max(processed + 1);
        }
        if lo > hi {
            return;
        }

        for offset in lo..=hi {
            if let (Some(produced_ts), Some(committed_ts)) = (
                series.produced.timestamp_at(offset),
                series.committed.timestamp_at(offset),
            ) {
                deltas.push(committed_ts - produced_ts);
            }
        }

        series.produced.trim_to(hi);
        series.committed.trim_to(hi);
        series.processed_through = Some(hi);
    }
}

impl Transformer for WaitTimeEstimator {
    fn compute(&mut self, raw: &Value, now_ms: u64) -> Vec<(String, Value)> {
        let Some(samples) = parse_partitions(raw) else {
            return Vec::new();
        };

        let mut deltas = Vec::new();
        for (partition, sample) in &samples {
            let (Some(tail), Some(committed)) = (sample.tail, sample.committed) else {
                continue;
            };
            let ts = sample.timestamp.unwrap_or(now_ms as f64 / 1000.0);
            let series = self.partitions.entry(partition.clone()).or_default();
            Self::reconcile(series, tail as i64, committed as i64, ts, &mut deltas);
        }

        if deltas.is_empty() {
            return Vec::new();
        }
        let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
        vec![(self.name.clone(), json!(mean))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(partition: &str, tail: i64, committed: i64, ts: f64) -> Value {
        json!({ partition: {"tail": tail, "commited": committed, "timestamp": ts} })
    }

    fn mean_of(out: Vec<(String, Value)>) -> Option<f64> {
        match out.as_slice() {
            [] => None,
            [(name, value)] => {
                assert_eq!(name, "wait_time");
                value.as_f64()
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn single_snapshot_emits_nothing() {
        let mut wt = WaitTimeEstimator::new("wait_time");
        assert!(wt.compute(&snapshot("p0", 10, 10, 0.0), 0).is_empty());
    }

    // Produced advances 10 -> 14 over t=0..4, committed 10 -> 14 over
    // t=1..5.5. The two series carry different timestamps for the same
    // offsets, so this drives DenseSeries directly.
    #[test]
    fn interpolated_overlap_yields_mean_delta() {
        let mut produced = DenseSeries::default();
        let mut committed = DenseSeries::default();
        assert!(matches!(produced.extend(10, 0.0), Extend::Extended));
        assert!(matches!(committed.extend(10, 1.0), Extend::Extended));
        assert!(matches!(produced.extend(14, 4.0), Extend::Extended));
        assert!(matches!(committed.extend(14, 5.5), Extend::Extended));

        let deltas: Vec<f64> = (10..=14)
            .map(|o| committed.timestamp_at(o).unwrap() - produced.timestamp_at(o).unwrap())
            .collect();
        let expected = [1.0, 1.125, 1.25, 1.375, 1.5];
        for (d, e) in deltas.iter().zip(expected) {
            assert!((d - e).abs() < 1e-9, "deltas {:?}", deltas);
        }
        let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
        assert!((mean - 1.25).abs() < 1e-9);
    }

    #[test]
    fn shared_timestamp_snapshots_estimate_steady_lag() {
        let mut wt = WaitTimeEstimator::new("wait_time");
        // Consumer trails producer by a steady 5 offsets at 1 offset/sec:
        // every record waits ~5 seconds.
        assert!(wt.compute(&snapshot("p0", 20, 15, 100.0), 0).is_empty());
        let out = wt.compute(&snapshot("p0", 30, 25, 110.0), 0);
        let mean = mean_of(out).expect("overlap exists");
        assert!((mean - 5.0).abs() < 1e-9, "mean {}", mean);
    }

    #[test]
    fn non_monotonic_offset_dropped_per_series() {
        let mut series = DenseSeries::default();
        assert!(matches!(series.extend(10, 0.0), Extend::Extended));
        assert!(matches!(series.extend(10, 1.0), Extend::Dropped));
        assert!(matches!(series.extend(8, 2.0), Extend::Dropped));
        assert_eq!(series.len(), 1);
        // A later advancing snapshot still extends
        assert!(matches!(series.extend(12, 3.0), Extend::Extended));
        assert_eq!(series.last_offset(), Some(12));
    }

    #[test]
    fn offsets_are_not_counted_twice_across_cycles() {
        let mut wt = WaitTimeEstimator::new("wait_time");
        wt.compute(&snapshot("p0", 20, 15, 100.0), 0);
        wt.compute(&snapshot("p0", 30, 25, 110.0), 0);
        // Third cycle only reconciles offsets 26..=35
        let out = wt.compute(&snapshot("p0", 40, 35, 120.0), 0);
        let mean = mean_of(out).expect("overlap exists");
        assert!((mean - 5.0).abs() < 1e-9);

        let series = &wt.partitions["p0"];
        assert_eq!(series.processed_through, Some(35));
        // Trimmed to the unreconciled tail
        assert_eq!(series.committed.first_offset(), Some(35));
        assert_eq!(series.produced.first_offset(), Some(35));
        assert_eq!(series.produced.last_offset(), Some(40));
    }

    #[test]
    fn stalled_consumer_emits_nothing() {
        let mut wt = WaitTimeEstimator::new("wait_time");
        wt.compute(&snapshot("p0", 20, 15, 100.0), 0);
        // Committed did not advance: committed series stays at one point
        let out = wt.compute(&snapshot("p0", 30, 15, 110.0), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn partitions_reconcile_independently() {
        let mut wt = WaitTimeEstimator::new("wait_time");
        let both = |t0: i64, c0: i64, t1: i64, c1: i64, ts: f64| {
            json!({
                "p0": {"tail": t0, "commited": c0, "timestamp": ts},
                "p1": {"tail": t1, "commited": c1, "timestamp": ts},
            })
        };
        wt.compute(&both(10, 5, 100, 90, 0.0), 0);
        // p0 waits 5s per record over offsets 10..=15 (6 deltas); p1
        // waits 10s but its series only overlap at offset 100 (1 delta).
        let out = wt.compute(&both(20, 15, 110, 100, 10.0), 0);
        let mean = mean_of(out).expect("both partitions overlap");
        let expected = (6.0 * 5.0 + 10.0) / 7.0;
        assert!((mean - expected).abs() < 1e-9, "mean {}", mean);
    }

    #[test]
    fn huge_offset_jump_restarts_series() {
        let mut series = DenseSeries::default();
        series.extend(0, 0.0);
        series.extend(2_000_000, 1.0);
        assert_eq!(series.len(), 1);
        assert_eq!(series.first_offset(), Some(2_000_000));
    }

    #[test]
    fn missing_offsets_fields_are_skipped() {
        let mut wt = WaitTimeEstimator::new("wait_time");
        let out = wt.compute(&json!({"p0": {"lag": 5}}), 0);
        assert!(out.is_empty());
        assert!(wt.partitions.is_empty());
    }

    #[test]
    fn clock_fallback_when_sample_unstamped() {
        let mut wt = WaitTimeEstimator::new("wait_time");
        wt.compute(&json!({"p0": {"tail": 20, "commited": 15}}), 100_000);
        let out = wt.compute(&json!({"p0": {"tail": 30, "commited": 25}}), 110_000);
        let mean = mean_of(out).expect("overlap exists");
        assert!((mean - 5.0).abs() < 1e-9);
    }
}

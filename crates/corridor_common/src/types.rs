//! Core data model for corridor synthesis.
//!
//! Everything that crosses a component boundary is a typed record with a
//! serde round-trip; raw maps stop at the grouping layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label set for one series. A `BTreeMap` keeps keys sorted, so the
/// serialized JSON is the canonical fingerprint directly.
pub type LabelSet = BTreeMap<String, String>;

/// Marker label carried by placeholder cache entries for sparse metrics.
pub const UNUSED_METRIC_LABEL: &str = "unused_metric";

/// A single time-series point: epoch seconds and value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: i64,
    pub v: f64,
}

impl Sample {
    pub fn new(t: i64, v: f64) -> Self {
        Self { t, v }
    }
}

/// Linear regression `y = slope * t + intercept` over epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
}

impl TrendLine {
    pub fn value_at(&self, t: i64) -> f64 {
        self.slope * t as f64 + self.intercept
    }

    pub fn is_zero(&self) -> bool {
        self.slope == 0.0 && self.intercept == 0.0
    }
}

/// One DFT harmonic. `k = 0` is the DC term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Harmonic {
    pub k: usize,
    pub amplitude: f64,
    pub phase: f64,
}

/// A fully restorable boundary curve: selected harmonics plus the removed
/// linear trend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryCurve {
    pub coeffs: Vec<Harmonic>,
    pub trend: TrendLine,
}

impl BoundaryCurve {
    /// Amplitude of the DC term, 0 when no DC harmonic was kept.
    pub fn dc_amplitude(&self) -> f64 {
        self.coeffs
            .iter()
            .find(|h| h.k == 0)
            .map(|h| h.amplitude * h.phase.cos())
            .unwrap_or(0.0)
    }
}

/// The synthesized corridor: two restorable curves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorridorSpec {
    pub upper: BoundaryCurve,
    pub lower: BoundaryCurve,
}

/// Side of the corridor a sample can escape through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
}

/// Anomaly statistics for one direction.
///
/// `durations` and `sizes` hold either raw per-anomaly values (ascending)
/// or a fixed-length percentile summary, depending on how they were built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionStats {
    pub time_outside_percent: f64,
    pub anomaly_count: u64,
    pub durations: Vec<f64>,
    pub sizes: Vec<f64>,
    pub direction: Direction,
}

impl DirectionStats {
    pub fn empty(direction: Direction) -> Self {
        Self {
            time_outside_percent: 0.0,
            anomaly_count: 0,
            durations: Vec::new(),
            sizes: Vec::new(),
            direction,
        }
    }
}

/// The combined view carries only the two scalars.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombinedStats {
    pub time_outside_percent: f64,
    pub anomaly_count: u64,
}

/// Full per-series anomaly statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyStats {
    pub above: DirectionStats,
    pub below: DirectionStats,
    pub combined: CombinedStats,
}

impl Default for AnomalyStats {
    fn default() -> Self {
        Self {
            above: DirectionStats::empty(Direction::Above),
            below: DirectionStats::empty(Direction::Below),
            combined: CombinedStats::default(),
        }
    }
}

/// One persisted cache row per `(query, fingerprint)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data_start: i64,
    pub step: i64,
    /// `data_end - data_start`, never negative.
    pub total_duration: i64,
    /// Monotonically increases on every recompute for this key.
    pub dft_rebuild_count: u64,
    pub labels: LabelSet,
    pub created_at: i64,
    pub config_hash: String,
    /// Percentile-summarized stats from the historical window.
    pub anomaly_stats: AnomalyStats,
    pub dft_upper: BoundaryCurve,
    pub dft_lower: BoundaryCurve,
    pub last_accessed: i64,
}

impl CacheEntry {
    /// Placeholder entries short-circuit all computation for sparse metrics.
    pub fn is_placeholder(&self) -> bool {
        self.labels
            .get(UNUSED_METRIC_LABEL)
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    /// Build a placeholder entry for a metric with too little history.
    pub fn placeholder(mut labels: LabelSet, config_hash: String, now: i64) -> Self {
        labels.insert(UNUSED_METRIC_LABEL.to_string(), "true".to_string());
        Self {
            labels,
            config_hash,
            created_at: now,
            last_accessed: now,
            ..Default::default()
        }
    }

    pub fn age_seconds(&self, now: i64) -> i64 {
        (now - self.created_at).max(0)
    }
}

/// Canonical JSON of a label map: keys sorted, `__name__` already stripped
/// by the grouping layer.
pub fn labels_fingerprint(labels: &LabelSet) -> String {
    serde_json::to_string(labels).unwrap_or_else(|_| "{}".to_string())
}

//! Anomaly statistics against the corridor, percentile summaries, and the
//! integral concern scalars.
//!
//! Direction walks are deterministic: a sample is anomalous when it sits
//! strictly outside the interpolated boundary at its own timestamp. Sizes
//! are percentages of the boundary value, durations are seconds since the
//! last in-corridor sample.

use crate::config::DefaultPercentiles;
use crate::grouper::interpolate_at;
use crate::types::{AnomalyStats, CombinedStats, Direction, DirectionStats, Sample};

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Linear-interpolated percentile over an ascending-sorted slice at rank
/// `(p / 100) * (n - 1)`. Returns 0 on empty input.
fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (rank.ceil() as usize).min(sorted.len() - 1);
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Percentile of the positive values only; 0 when none remain.
pub fn calculate_percentile(values: &[f64], p: f64) -> f64 {
    let mut positive: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    if positive.is_empty() {
        return 0.0;
    }
    positive.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    percentile_of_sorted(&positive, p)
}

/// Fixed-length percentile summary for cache persistence: with at most
/// `|percentiles|` raw values the sorted raw set is zero-padded instead.
fn percentile_summary(values: &[f64], percentiles: &[u32]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    if sorted.len() <= percentiles.len() {
        let mut padded: Vec<f64> = sorted.iter().map(|v| round2(*v)).collect();
        padded.resize(percentiles.len(), 0.0);
        return padded;
    }
    percentiles
        .iter()
        .map(|&p| round2(percentile_of_sorted(&sorted, p as f64)))
        .collect()
}

fn direction_walk(samples: &[Sample], boundary: &[Sample], direction: Direction) -> DirectionStats {
    let mut stats = DirectionStats::empty(direction);
    if samples.is_empty() {
        return stats;
    }

    let mut in_anomaly = false;
    let mut anomaly_start = samples[0].t;
    let mut run_duration = 0.0;
    let mut time_outside = 0.0;

    for (idx, s) in samples.iter().enumerate() {
        let b = interpolate_at(boundary, s.t);
        let anomalous = match direction {
            Direction::Above => s.v > b,
            Direction::Below => s.v < b,
        };

        if anomalous {
            if !in_anomaly {
                anomaly_start = if idx > 0 { samples[idx - 1].t } else { s.t };
                in_anomaly = true;
            }
            run_duration = (s.t - anomaly_start) as f64;
            stats.durations.push(run_duration);
            stats
                .sizes
                .push(round2((s.v - b).abs() / b.max(1.0) * 100.0));
            stats.anomaly_count += 1;
        } else if in_anomaly {
            time_outside += run_duration;
            in_anomaly = false;
            run_duration = 0.0;
        }
    }
    if in_anomaly {
        time_outside += run_duration;
    }

    let span = (samples[samples.len() - 1].t - samples[0].t) as f64;
    stats.time_outside_percent = if span > 0.0 {
        100.0 * time_outside / span
    } else {
        0.0
    };
    stats
}

/// Compare a series against the corridor and produce per-direction stats.
///
/// With `raw = true` the duration/size arrays are the ascending-sorted raw
/// values; otherwise they are replaced by the fixed-length percentile
/// summary persisted in the cache.
pub fn calculate_anomaly_stats(
    samples: &[Sample],
    upper: &[Sample],
    lower: &[Sample],
    percentiles: &[u32],
    raw: bool,
) -> AnomalyStats {
    let mut above = direction_walk(samples, upper, Direction::Above);
    let mut below = direction_walk(samples, lower, Direction::Below);

    let combined = CombinedStats {
        time_outside_percent: above.time_outside_percent + below.time_outside_percent,
        anomaly_count: above.anomaly_count + below.anomaly_count,
    };

    for stats in [&mut above, &mut below] {
        if raw {
            stats
                .durations
                .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            stats
                .sizes
                .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        } else {
            stats.durations = percentile_summary(&stats.durations, percentiles);
            stats.sizes = percentile_summary(&stats.sizes, percentiles);
        }
    }

    AnomalyStats {
        above,
        below,
        combined,
    }
}

/// Integral concern for one direction: the present worst anomaly area
/// against the historical percentile area, squashed into `[0, 1]`.
pub fn integral_concern(
    history: &DirectionStats,
    current: &DirectionStats,
    pcts: &DefaultPercentiles,
) -> f64 {
    let hist_dur = calculate_percentile(&history.durations, pcts.duration);
    let hist_sz = calculate_percentile(&history.sizes, pcts.size);
    if hist_dur == 0.0 || hist_sz == 0.0 {
        return 0.0;
    }
    let hist_area = hist_dur * hist_sz;

    let max_of = |values: &[f64]| values.iter().copied().fold(0.0f64, f64::max);
    let cur_dur = max_of(&current.durations) * pcts.duration_multiplier;
    let cur_sz = max_of(&current.sizes) * pcts.size_multiplier;
    if cur_dur == 0.0 || cur_sz == 0.0 {
        return 0.0;
    }

    let ratio = (cur_dur * cur_sz / hist_area).exp();
    ratio.min(10.0) / 10.0
}

/// Historical duration percentile with long anomalies capped once they
/// cannot fit the observation window.
fn adjust_percentile(durations: &[f64], p: f64, window_seconds: f64) -> f64 {
    let hist_dur = calculate_percentile(durations, p);
    if window_seconds >= hist_dur {
        return hist_dur;
    }
    let cap = hist_dur.min(window_seconds / 2.0);
    let capped: Vec<f64> = durations.iter().map(|d| d.min(cap)).collect();
    calculate_percentile(&capped, p)
}

/// Summed concern: every current anomaly contributes its area, against a
/// window-adjusted historical envelope. Result in `[0, 1]`.
pub fn concern_sum(
    history: &DirectionStats,
    current: &DirectionStats,
    pcts: &DefaultPercentiles,
    window_seconds: f64,
) -> f64 {
    let hist_dur = adjust_percentile(&history.durations, pcts.duration, window_seconds);
    let hist_sz = calculate_percentile(&history.sizes, pcts.size);
    if hist_dur == 0.0 || hist_sz == 0.0 {
        return 0.0;
    }
    let hist_area = hist_dur * hist_sz;

    let total: f64 = current
        .durations
        .iter()
        .zip(current.sizes.iter())
        .map(|(d, s)| (d * pcts.duration_multiplier) * (s * pcts.size_multiplier))
        .sum();
    if total == 0.0 {
        return 0.0;
    }

    let ratio = (total / hist_area).exp();
    ratio.min(10.0) / 10.0
}

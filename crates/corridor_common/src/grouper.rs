//! Splits raw upstream samples by label set and resamples onto a uniform
//! grid.

use std::collections::BTreeMap;
use tracing::warn;

use crate::datasource::{parse_local_timestamp, RawSample};
use crate::types::{labels_fingerprint, LabelSet, Sample};

/// One grouped series: its identifying labels and its samples.
#[derive(Debug, Clone, Default)]
pub struct SeriesGroup {
    pub labels: LabelSet,
    pub samples: Vec<Sample>,
}

/// Group raw samples by canonical label fingerprint.
///
/// `__name__` is dropped from the label set before fingerprinting; sample
/// timestamps are parsed to epoch seconds and values coerced to f64.
/// Samples with unparseable timestamps are skipped with a warning.
pub fn group(raw: &[RawSample]) -> BTreeMap<String, SeriesGroup> {
    let mut groups: BTreeMap<String, SeriesGroup> = BTreeMap::new();
    let mut skipped = 0usize;

    for sample in raw {
        let Some(t) = parse_local_timestamp(&sample.time) else {
            skipped += 1;
            continue;
        };

        let labels: LabelSet = sample
            .labels
            .iter()
            .filter(|(k, _)| k.as_str() != "__name__")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let fingerprint = labels_fingerprint(&labels);
        let entry = groups.entry(fingerprint).or_insert_with(|| SeriesGroup {
            labels,
            samples: Vec::new(),
        });
        entry.samples.push(Sample::new(t, sample.value));
    }

    if skipped > 0 {
        warn!(skipped, "dropped samples with unparseable timestamps");
    }

    for group in groups.values_mut() {
        group.samples.sort_by_key(|s| s.t);
    }
    groups
}

/// Linearly interpolated value of `samples` (sorted by time) at `t`.
///
/// Outside the data the nearest-side value is returned; with no data, 0.
pub fn interpolate_at(samples: &[Sample], t: i64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let first = samples[0];
    let last = samples[samples.len() - 1];
    if t <= first.t {
        return first.v;
    }
    if t >= last.t {
        return last.v;
    }

    // partition_point: index of the first sample with time > t
    let idx = samples.partition_point(|s| s.t <= t);
    let left = samples[idx - 1];
    let right = samples[idx];
    if right.t == left.t {
        return left.v;
    }
    let frac = (t - left.t) as f64 / (right.t - left.t) as f64;
    left.v + frac * (right.v - left.v)
}

/// Resample onto the uniform grid `{start, start+step, ..., <= end}`.
///
/// Input order does not matter; the grid is empty when `end < start` and
/// the step is clamped to at least 1 second.
pub fn interpolate(samples: &[Sample], start: i64, end: i64, step: i64) -> Vec<Sample> {
    if end < start {
        return Vec::new();
    }
    let step = step.max(1);

    let mut sorted = samples.to_vec();
    sorted.sort_by_key(|s| s.t);

    let mut out = Vec::with_capacity(((end - start) / step + 1) as usize);
    let mut t = start;
    while t <= end {
        out.push(Sample::new(t, interpolate_at(&sorted, t)));
        t += step;
    }
    out
}

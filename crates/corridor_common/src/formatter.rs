//! Re-emits processed results in Prometheus `query_range` response shape
//! so dashboard panels can plot them directly.
//!
//! Each label group yields its original series plus the two corridor
//! curves and a set of single-point stat series, all distinguished by
//! synthetic labels.

use serde::Serialize;

use crate::orchestrator::MetricResult;
use crate::types::{LabelSet, Sample};

/// Synthetic label distinguishing derived series from the original.
pub const SERIES_LABEL: &str = "corridor_series";

#[derive(Debug, Serialize)]
pub struct QueryRangeResponse {
    pub status: &'static str,
    pub data: QueryRangeData,
}

#[derive(Debug, Serialize)]
pub struct QueryRangeData {
    #[serde(rename = "resultType")]
    pub result_type: &'static str,
    pub result: Vec<MatrixSeries>,
}

/// One matrix entry: labels plus `[timestamp, "value"]` pairs.
#[derive(Debug, Serialize)]
pub struct MatrixSeries {
    pub metric: LabelSet,
    pub values: Vec<(i64, String)>,
}

fn format_value(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        "0".to_string()
    }
}

fn series(labels: &LabelSet, tag: Option<&str>, samples: &[Sample]) -> MatrixSeries {
    let mut metric = labels.clone();
    if let Some(tag) = tag {
        metric.insert(SERIES_LABEL.to_string(), tag.to_string());
    }
    MatrixSeries {
        metric,
        values: samples
            .iter()
            .map(|s| (s.t, format_value(s.v)))
            .collect(),
    }
}

fn scalar(labels: &LabelSet, tag: &str, t: i64, v: f64) -> MatrixSeries {
    series(labels, Some(tag), &[Sample::new(t, v)])
}

/// Build the full response for one request.
///
/// Stat scalars are anchored at `end` so panels render them at the right
/// edge of the window.
pub fn format_matrix(results: &[MetricResult], metric_name: &str, end: i64) -> QueryRangeResponse {
    let mut matrix = Vec::new();

    for result in results {
        let mut original_labels = result.labels.clone();
        original_labels.insert("__name__".to_string(), metric_name.to_string());
        matrix.push(series(&original_labels, None, &result.original));

        matrix.push(series(&result.labels, Some("dft_upper"), &result.dft_upper));
        matrix.push(series(&result.labels, Some("dft_lower"), &result.dft_lower));

        let stats = [
            (
                "anomaly_percent_above",
                result.current_stats.above.time_outside_percent,
            ),
            (
                "anomaly_percent_below",
                result.current_stats.below.time_outside_percent,
            ),
            (
                "anomaly_count",
                result.current_stats.combined.anomaly_count as f64,
            ),
            ("concern_above", result.concern.above),
            ("concern_below", result.concern.below),
            ("concern_sum_above", result.concern_sum.above),
            ("concern_sum_below", result.concern_sum.below),
            ("dft_rebuild_count", result.dft_rebuild_count as f64),
        ];
        for (tag, value) in stats {
            matrix.push(scalar(&result.labels, tag, end, value));
        }
    }

    QueryRangeResponse {
        status: "success",
        data: QueryRangeData {
            result_type: "matrix",
            result: matrix,
        },
    }
}

//! End-to-end pipeline tests against a canned data source.

use chrono::{Local, TimeZone};
use corridor_common::{
    Config, DataSource, PerfRecorder, PersistentCache, RawSample, Result, StatsPipeline,
};
use std::collections::HashMap;

/// Mid-November anchor, away from DST transitions in common zones.
const T0: i64 = 1_700_000_000;

fn format_local(t: i64) -> String {
    Local
        .timestamp_opt(t, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

type Generator = Box<dyn Fn(i64) -> f64 + Send + Sync>;

/// Serves every group from a value generator over any requested range.
struct FakeSource {
    groups: Vec<(HashMap<String, String>, Generator)>,
}

impl FakeSource {
    fn single(job: &str, generator: Generator) -> Self {
        Self {
            groups: vec![(labels(job), generator)],
        }
    }
}

fn labels(job: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("__name__".to_string(), "fake_metric".to_string());
    map.insert("job".to_string(), job.to_string());
    map
}

impl DataSource for FakeSource {
    fn list_metrics(&self) -> Result<Vec<String>> {
        Ok(vec!["fake_metric".to_string()])
    }

    fn query_range(
        &self,
        _metric: &str,
        start_sec: i64,
        end_sec: i64,
        step_sec: i64,
    ) -> Result<Vec<RawSample>> {
        let step = step_sec.max(1);
        let mut out = Vec::new();
        for (group_labels, generator) in &self.groups {
            let mut t = start_sec;
            while t <= end_sec {
                out.push(RawSample {
                    time: format_local(t),
                    value: generator(t),
                    labels: group_labels.clone(),
                });
                t += step;
            }
        }
        Ok(out)
    }
}

/// Small windows keep the O(N^2) transform fast in tests.
fn test_config() -> Config {
    let mut config = Config::default();
    config.corridor.step = 300;
    config.corridor.historical_period_days = 1;
    config.corridor.historical_offset_days = 1;
    config
}

#[test]
fn test_quiet_series_stays_inside_corridor() {
    let cache = PersistentCache::open_in_memory().unwrap();
    let config = test_config();
    let pipeline = StatsPipeline::new(&cache, &config);
    let source = FakeSource::single("api", Box::new(|_| 10.0));

    let mut perf = PerfRecorder::new();
    let results = pipeline
        .process_query(&source, "fake_metric", T0, T0 + 3600, 60, T0 + 3600, &mut perf)
        .unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(!result.original.is_empty());
    assert_eq!(result.dft_upper.len(), result.dft_lower.len());
    assert!(!result.dft_upper.is_empty());
    assert_eq!(result.current_stats.combined.anomaly_count, 0);
    assert_eq!(result.concern.above, 0.0);
    assert_eq!(result.dft_rebuild_count, 1);
    assert!(!perf.spans().is_empty());

    // corridor brackets the flat level everywhere
    for (u, l) in result.dft_upper.iter().zip(result.dft_lower.iter()) {
        assert!(u.v >= 10.0, "upper {} below level", u.v);
        assert!(l.v <= 10.0, "lower {} above level", l.v);
    }
}

#[test]
fn test_second_request_reuses_cache() {
    let cache = PersistentCache::open_in_memory().unwrap();
    let config = test_config();
    let pipeline = StatsPipeline::new(&cache, &config);
    let source = FakeSource::single("api", Box::new(|_| 10.0));

    let mut perf = PerfRecorder::new();
    let first = pipeline
        .process_query(&source, "fake_metric", T0, T0 + 3600, 60, T0 + 3600, &mut perf)
        .unwrap();
    let second = pipeline
        .process_query(&source, "fake_metric", T0, T0 + 3600, 60, T0 + 3700, &mut perf)
        .unwrap();

    // same key, no recompute: rebuild count stays at 1
    assert_eq!(first[0].dft_rebuild_count, 1);
    assert_eq!(second[0].dft_rebuild_count, 1);
}

#[test]
fn test_live_spike_is_detected() {
    let cache = PersistentCache::open_in_memory().unwrap();
    let config = test_config();
    let pipeline = StatsPipeline::new(&cache, &config);

    let spike_start = T0 + 1800;
    let source = FakeSource::single(
        "api",
        Box::new(move |t| {
            if t >= spike_start && t < spike_start + 300 {
                500.0
            } else {
                10.0
            }
        }),
    );

    let mut perf = PerfRecorder::new();
    let results = pipeline
        .process_query(&source, "fake_metric", T0, T0 + 3600, 60, T0 + 3600, &mut perf)
        .unwrap();

    let result = &results[0];
    assert!(result.current_stats.above.anomaly_count > 0);
    assert!(result.current_stats.above.time_outside_percent > 0.0);
    assert!(result.current_stats.above.time_outside_percent <= 100.0);
    assert!(result.concern.above >= 0.0 && result.concern.above <= 1.0);
    assert!(result.concern_sum.above >= 0.0 && result.concern_sum.above <= 1.0);
}

#[test]
fn test_sparse_metric_short_circuits() {
    let cache = PersistentCache::open_in_memory().unwrap();
    let config = test_config();
    let pipeline = StatsPipeline::new(&cache, &config);
    let source = FakeSource::single("api", Box::new(|_| 10.0));

    // force the placeholder path by demanding more history than exists
    let query = "fake_metric#corrdor_params.min_data_points=100000";
    let mut perf = PerfRecorder::new();
    let results = pipeline
        .process_query(&source, query, T0, T0 + 3600, 60, T0 + 3600, &mut perf)
        .unwrap();

    let result = &results[0];
    assert!(!result.original.is_empty());
    assert!(result.dft_upper.is_empty());
    assert!(result.dft_lower.is_empty());
    assert_eq!(result.current_stats.combined.anomaly_count, 0);
    assert_eq!(result.concern.above, 0.0);
    assert_eq!(result.dft_rebuild_count, 0);

    // later requests keep short-circuiting while the placeholder is fresh
    let again = pipeline
        .process_query(&source, query, T0, T0 + 3600, 60, T0 + 3660, &mut perf)
        .unwrap();
    assert!(again[0].dft_upper.is_empty());
}

#[test]
fn test_metric_cap_skips_extra_groups() {
    let cache = PersistentCache::open_in_memory().unwrap();
    let mut config = test_config();
    config.timeout.max_metrics = 2;
    let pipeline = StatsPipeline::new(&cache, &config);

    let source = FakeSource {
        groups: vec![
            (labels("a"), Box::new(|_| 1.0) as Generator),
            (labels("b"), Box::new(|_| 2.0) as Generator),
            (labels("c"), Box::new(|_| 3.0) as Generator),
        ],
    };

    let mut perf = PerfRecorder::new();
    let results = pipeline
        .process_query(&source, "fake_metric", T0, T0 + 600, 60, T0 + 600, &mut perf)
        .unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn test_override_changes_invalidate_cache() {
    let cache = PersistentCache::open_in_memory().unwrap();
    let config = test_config();
    let pipeline = StatsPipeline::new(&cache, &config);
    let source = FakeSource::single("api", Box::new(|_| 10.0));

    let mut perf = PerfRecorder::new();
    let first = pipeline
        .process_query(&source, "fake_metric", T0, T0 + 600, 60, T0 + 600, &mut perf)
        .unwrap();
    assert_eq!(first[0].dft_rebuild_count, 1);

    // save-prefixed overrides hash identically: no recompute
    let second = pipeline
        .process_query(
            &source,
            "fake_metric#save_raw=true",
            T0,
            T0 + 600,
            60,
            T0 + 660,
            &mut perf,
        )
        .unwrap();
    assert_eq!(second[0].dft_rebuild_count, 1);

    // different corridor parameters: same key recomputes
    let third = pipeline
        .process_query(
            &source,
            "fake_metric#corrdor_params.margin_percent=9.5",
            T0,
            T0 + 600,
            60,
            T0 + 720,
            &mut perf,
        )
        .unwrap();
    assert_eq!(third[0].dft_rebuild_count, 2);
}

#[test]
fn test_formatter_roundtrip() {
    let cache = PersistentCache::open_in_memory().unwrap();
    let config = test_config();
    let pipeline = StatsPipeline::new(&cache, &config);
    let source = FakeSource::single("api", Box::new(|_| 10.0));

    let mut perf = PerfRecorder::new();
    let results = pipeline
        .process_query(&source, "fake_metric", T0, T0 + 600, 60, T0 + 600, &mut perf)
        .unwrap();

    let response = corridor_common::format_matrix(&results, "fake_metric", T0 + 600);
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["resultType"], "matrix");
    assert!(json["data"]["result"].as_array().unwrap().len() >= 3);
}

//! Request orchestration: recompute-vs-reuse decisions, placeholder
//! handling for sparse metrics, and the per-group processing pipeline.
//!
//! One request is serviced sequentially; the cache connection is the only
//! shared state. Cache write failures degrade the request (no persistence)
//! instead of failing it.

use tracing::{debug, info, warn};

use crate::anomaly;
use crate::bounds;
use crate::cache::PersistentCache;
use crate::config::Config;
use crate::datasource::DataSource;
use crate::dft;
use crate::error::Result;
use crate::grouper::{self, SeriesGroup};
use crate::perf::PerfRecorder;
use crate::types::{AnomalyStats, CacheEntry, LabelSet, Sample};
use crate::width;

/// Concern scalars per escape direction, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConcernScores {
    pub above: f64,
    pub below: f64,
}

/// Fully processed output for one label group.
#[derive(Debug, Clone)]
pub struct MetricResult {
    pub labels: LabelSet,
    /// Live samples, untouched.
    pub original: Vec<Sample>,
    pub dft_upper: Vec<Sample>,
    pub dft_lower: Vec<Sample>,
    /// Raw stats of the live window against the corridor.
    pub current_stats: AnomalyStats,
    /// Percentile-summarized stats from the cached history.
    pub historical_stats: AnomalyStats,
    pub concern: ConcernScores,
    pub concern_sum: ConcernScores,
    pub dft_rebuild_count: u64,
}

/// Glues grouping, corridor synthesis, anomaly detection and the cache.
pub struct StatsPipeline<'a> {
    cache: &'a PersistentCache,
    config: &'a Config,
}

impl<'a> StatsPipeline<'a> {
    pub fn new(cache: &'a PersistentCache, config: &'a Config) -> Self {
        Self { cache, config }
    }

    /// Service one `query_range`-shaped request end to end.
    ///
    /// Per-query `#` overrides apply to a request-local config copy. At
    /// most `timeout.max_metrics` label groups are processed; the rest are
    /// skipped with a warning.
    pub fn process_query(
        &self,
        source: &dyn DataSource,
        query: &str,
        start: i64,
        end: i64,
        step: i64,
        now: i64,
        perf: &mut PerfRecorder,
    ) -> Result<Vec<MetricResult>> {
        let (clean_query, cfg) = self.config.with_query_overrides(query)?;
        cfg.validate_corridor()?;
        let config_hash = cfg.hash();

        let raw_live = perf.measure("datasource_live", || {
            source.query_range(&clean_query, start, end, step)
        })?;
        let live_groups = perf.measure("group", || grouper::group(&raw_live));

        let hist_end = end - cfg.corridor.historical_offset_days * 86_400;
        let hist_start = hist_end - cfg.corridor.historical_period_days * 86_400;
        let raw_history = perf.measure("datasource_history", || {
            source.query_range(&clean_query, hist_start, hist_end, cfg.corridor.step)
        })?;
        let mut history_groups = perf.measure("group", || grouper::group(&raw_history));

        let total_groups = live_groups.len();
        let mut results = Vec::new();
        for (idx, (fingerprint, group)) in live_groups.into_iter().enumerate() {
            if idx >= cfg.timeout.max_metrics {
                warn!(
                    processed = cfg.timeout.max_metrics,
                    skipped = total_groups - cfg.timeout.max_metrics,
                    query = %clean_query,
                    "metric cap reached; skipping remaining label groups"
                );
                break;
            }
            let history = history_groups
                .remove(&fingerprint)
                .map(|g| g.samples)
                .unwrap_or_default();
            results.push(self.process_group(
                &clean_query,
                &fingerprint,
                group,
                &history,
                start,
                end,
                step,
                now,
                &cfg,
                &config_hash,
                perf,
            )?);
        }

        if let Some((_, overrides)) = query.split_once('#') {
            if let Err(err) = self.cache.set_custom_params(&clean_query, overrides) {
                warn!(%err, "failed to record query overrides");
            }
        }

        debug!(query = %clean_query, timings = %perf.summary(), "request processed");
        Ok(results)
    }

    /// Process one label group: reuse or rebuild the cached corridor, then
    /// compare the live window against it.
    #[allow(clippy::too_many_arguments)]
    fn process_group(
        &self,
        query: &str,
        fingerprint: &str,
        group: SeriesGroup,
        history: &[Sample],
        start: i64,
        end: i64,
        step: i64,
        now: i64,
        cfg: &Config,
        config_hash: &str,
        perf: &mut PerfRecorder,
    ) -> Result<MetricResult> {
        let recreate = self.cache.should_recreate(
            query,
            fingerprint,
            config_hash,
            cfg.cache.database.max_ttl,
            now,
        )?;
        let entry = if recreate {
            perf.measure("recalculate", || {
                self.recalculate_stats(query, fingerprint, &group.labels, history, cfg, config_hash, now)
            })?
        } else {
            match self.cache.load(query, fingerprint)? {
                Some(entry) => entry,
                // raced with a sweep; rebuild
                None => self.recalculate_stats(
                    query,
                    fingerprint,
                    &group.labels,
                    history,
                    cfg,
                    config_hash,
                    now,
                )?,
            }
        };
        self.cache
            .warn_on_rebuild_churn(query, &entry, cfg.cache.max_rebuild_count);
        if let Err(err) = self.cache.touch(query, fingerprint, now) {
            warn!(%err, "access-time refresh failed");
        }

        if entry.is_placeholder() {
            return Ok(Self::process_insufficient_data(group, &entry));
        }

        let mut upper = dft::restore(
            &entry.dft_upper.coeffs,
            Some(&entry.dft_upper.trend),
            entry.data_start,
            entry.total_duration,
            start,
            end,
            step,
        );
        let mut lower = dft::restore(
            &entry.dft_lower.coeffs,
            Some(&entry.dft_lower.trend),
            entry.data_start,
            entry.total_duration,
            start,
            end,
            step,
        );

        if cfg.scale_corridor {
            rebase_to_live_level(&mut upper, &mut lower, &group.samples);
        }

        width::ensure_width(
            &mut upper,
            &mut lower,
            entry.dft_upper.dc_amplitude(),
            entry.dft_lower.dc_amplitude(),
            cfg.corridor.min_corridor_width_factor,
        );

        let current = anomaly::calculate_anomaly_stats(
            &group.samples,
            &upper,
            &lower,
            &cfg.cache.percentiles,
            true,
        );

        let pcts = &cfg.corridor.default_percentiles;
        let hist = &entry.anomaly_stats;
        let window_seconds = (end - start).max(0) as f64;
        let concern = ConcernScores {
            above: anomaly::integral_concern(&hist.above, &current.above, pcts),
            below: anomaly::integral_concern(&hist.below, &current.below, pcts),
        };
        let concern_sum = ConcernScores {
            above: anomaly::concern_sum(&hist.above, &current.above, pcts, window_seconds),
            below: anomaly::concern_sum(&hist.below, &current.below, pcts, window_seconds),
        };

        Ok(MetricResult {
            labels: group.labels,
            original: group.samples,
            dft_upper: upper,
            dft_lower: lower,
            current_stats: current,
            historical_stats: entry.anomaly_stats.clone(),
            concern,
            concern_sum,
            dft_rebuild_count: entry.dft_rebuild_count,
        })
    }

    /// Rebuild the cached corridor and historical stats for one key, or
    /// return the fresh placeholder untouched.
    pub fn recalculate_stats(
        &self,
        query: &str,
        fingerprint: &str,
        labels: &LabelSet,
        history: &[Sample],
        cfg: &Config,
        config_hash: &str,
        now: i64,
    ) -> Result<CacheEntry> {
        let cached = match self.cache.load(query, fingerprint) {
            Ok(cached) => cached,
            Err(err) => {
                warn!(%err, "cache read failed; treating as miss");
                None
            }
        };
        if let Some(existing) = &cached {
            if existing.is_placeholder()
                && existing.age_seconds(now) <= cfg.cache.database.max_ttl
            {
                return Ok(existing.clone());
            }
        }

        let step = cfg.corridor.step;
        let data_start = history.iter().map(|s| s.t).min();
        let data_end = history.iter().map(|s| s.t).max();

        if history.len() < cfg.corridor.min_data_points.max(1) {
            info!(
                query,
                fingerprint,
                samples = history.len(),
                needed = cfg.corridor.min_data_points,
                "insufficient history; storing placeholder"
            );
            let mut entry = CacheEntry::placeholder(labels.clone(), config_hash.to_string(), now);
            entry.step = step;
            if let (Some(s), Some(e)) = (data_start, data_end) {
                entry.data_start = s;
                entry.total_duration = e - s;
            }
            self.persist(query, fingerprint, &entry)?;
            return Ok(entry);
        }

        let data_start = data_start.unwrap_or(0);
        let data_end = data_end.unwrap_or(data_start);
        let total_duration = (data_end - data_start).max(0);

        let grid = grouper::interpolate(history, data_start, data_end, step);
        let envelopes = bounds::build(&grid, &cfg.corridor)?;
        let spec = dft::build_corridor_spec(&envelopes.upper, &envelopes.lower, &cfg.corridor);

        let upper_restored = dft::restore(
            &spec.upper.coeffs,
            Some(&spec.upper.trend),
            data_start,
            total_duration,
            data_start,
            data_end,
            step,
        );
        let lower_restored = dft::restore(
            &spec.lower.coeffs,
            Some(&spec.lower.trend),
            data_start,
            total_duration,
            data_start,
            data_end,
            step,
        );
        let stats = anomaly::calculate_anomaly_stats(
            &grid,
            &upper_restored,
            &lower_restored,
            &cfg.cache.percentiles,
            false,
        );

        let entry = CacheEntry {
            data_start,
            step,
            total_duration,
            dft_rebuild_count: cached.as_ref().map(|c| c.dft_rebuild_count + 1).unwrap_or(1),
            labels: labels.clone(),
            created_at: now,
            config_hash: config_hash.to_string(),
            anomaly_stats: stats,
            dft_upper: spec.upper,
            dft_lower: spec.lower,
            last_accessed: now,
        };
        self.persist(query, fingerprint, &entry)?;
        Ok(entry)
    }

    /// Persist, degrading recoverable failures to "retry next request";
    /// anything else aborts the request.
    fn persist(&self, query: &str, fingerprint: &str, entry: &CacheEntry) -> Result<()> {
        match self.cache.save(query, fingerprint, entry) {
            Ok(()) => Ok(()),
            Err(err) if err.is_recoverable() => {
                warn!(%err, query, "cache persist failed; proceeding without");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Response row for a sparse metric: the live samples pass through
    /// untouched, corridors stay empty, and only the cached historical
    /// stats are reported.
    fn process_insufficient_data(group: SeriesGroup, entry: &CacheEntry) -> MetricResult {
        MetricResult {
            labels: group.labels,
            original: group.samples,
            dft_upper: Vec::new(),
            dft_lower: Vec::new(),
            current_stats: AnomalyStats::default(),
            historical_stats: entry.anomaly_stats.clone(),
            concern: ConcernScores::default(),
            concern_sum: ConcernScores::default(),
            dft_rebuild_count: entry.dft_rebuild_count,
        }
    }
}

/// Shift both curves so the corridor center matches the live-window mean.
fn rebase_to_live_level(upper: &mut [Sample], lower: &mut [Sample], live: &[Sample]) {
    if live.is_empty() || upper.is_empty() || upper.len() != lower.len() {
        return;
    }
    let live_mean = live.iter().map(|s| s.v).sum::<f64>() / live.len() as f64;
    let center_mean = upper
        .iter()
        .zip(lower.iter())
        .map(|(u, l)| (u.v + l.v) / 2.0)
        .sum::<f64>()
        / upper.len() as f64;
    let offset = live_mean - center_mean;
    for s in upper.iter_mut() {
        s.v += offset;
    }
    for s in lower.iter_mut() {
        s.v += offset;
    }
}

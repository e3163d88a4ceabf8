//! Runtime configuration for the corridor pipeline.
//!
//! Dotted key groups map onto nested structs; `corrdor_params` is the
//! historical wire spelling and is preserved for compatibility. Unknown
//! top-level keys (including `save*` flags) are retained in a flattened
//! extras map so they survive round-trips and per-query overrides.
//!
//! The config hash is MD5 over a canonical JSON rendering: float leaves
//! rounded to 5 decimals, keys sorted at every level, top-level `save*`
//! keys stripped.

use anyhow::{Context, Result};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::CorridorError;

/// Percentile settings driving the integral concern metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultPercentiles {
    #[serde(default = "d_duration_pct")]
    pub duration: f64,
    #[serde(default = "d_size_pct")]
    pub size: f64,
    #[serde(default = "d_one")]
    pub duration_multiplier: f64,
    #[serde(default = "d_one")]
    pub size_multiplier: f64,
}

fn d_duration_pct() -> f64 {
    75.0
}
fn d_size_pct() -> f64 {
    75.0
}
fn d_one() -> f64 {
    1.0
}

impl Default for DefaultPercentiles {
    fn default() -> Self {
        Self {
            duration: d_duration_pct(),
            size: d_size_pct(),
            duration_multiplier: d_one(),
            size_multiplier: d_one(),
        }
    }
}

/// Corridor synthesis parameters (`corrdor_params` group).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorridorParams {
    /// Grid step in seconds for history interpolation and restoration.
    #[serde(default = "d_step")]
    pub step: i64,
    /// Sliding window size (samples) for the raw envelopes.
    #[serde(default = "d_window_size")]
    pub window_size: usize,
    /// Margin added to the envelope, percent of the window average.
    #[serde(default = "d_margin_percent")]
    pub margin_percent: f64,
    /// Maximum harmonics kept per boundary, including the DC term.
    #[serde(default = "d_max_harmonics")]
    pub max_harmonics: usize,
    /// Amplitude floor driving the contribution threshold.
    #[serde(default = "d_min_amplitude")]
    pub min_amplitude: f64,
    /// Below this many history samples the metric gets a placeholder.
    #[serde(default = "d_min_data_points")]
    pub min_data_points: usize,
    /// Factor of the DC spread enforced as minimum corridor width.
    #[serde(default = "d_min_width_factor")]
    pub min_corridor_width_factor: f64,
    /// Replace both boundary slopes with their mean.
    #[serde(default)]
    pub use_common_trend: bool,
    /// History window ends this many days before the request window.
    #[serde(default = "d_offset_days")]
    pub historical_offset_days: i64,
    /// History window length in days.
    #[serde(default = "d_period_days")]
    pub historical_period_days: i64,
    #[serde(default)]
    pub default_percentiles: DefaultPercentiles,
}

fn d_step() -> i64 {
    60
}
fn d_window_size() -> usize {
    10
}
fn d_margin_percent() -> f64 {
    5.0
}
fn d_max_harmonics() -> usize {
    10
}
fn d_min_amplitude() -> f64 {
    0.05
}
fn d_min_data_points() -> usize {
    10
}
fn d_min_width_factor() -> f64 {
    0.5
}
fn d_offset_days() -> i64 {
    1
}
fn d_period_days() -> i64 {
    14
}

impl Default for CorridorParams {
    fn default() -> Self {
        Self {
            step: d_step(),
            window_size: d_window_size(),
            margin_percent: d_margin_percent(),
            max_harmonics: d_max_harmonics(),
            min_amplitude: d_min_amplitude(),
            min_data_points: d_min_data_points(),
            min_corridor_width_factor: d_min_width_factor(),
            use_common_trend: false,
            historical_offset_days: d_offset_days(),
            historical_period_days: d_period_days(),
            default_percentiles: DefaultPercentiles::default(),
        }
    }
}

/// SQLite cache location and freshness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "d_db_path")]
    pub path: String,
    /// Entries older than this many seconds are recomputed.
    #[serde(default = "d_max_ttl")]
    pub max_ttl: i64,
}

fn d_db_path() -> String {
    "corridor_cache.db".to_string()
}
fn d_max_ttl() -> i64 {
    7 * 86400
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: d_db_path(),
            max_ttl: d_max_ttl(),
        }
    }
}

/// Cache behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Rebuilds past this count log a warning (never an error).
    #[serde(default = "d_max_rebuild")]
    pub max_rebuild_count: u64,
    /// Percentiles used for the fixed-length stats summaries.
    #[serde(default = "d_percentiles")]
    pub percentiles: Vec<u32>,
}

fn d_max_rebuild() -> u64 {
    50
}
fn d_percentiles() -> Vec<u32> {
    vec![25, 50, 75, 90, 95]
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            max_rebuild_count: d_max_rebuild(),
            percentiles: d_percentiles(),
        }
    }
}

/// Per-request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Label groups processed per request; further groups are skipped.
    #[serde(default = "d_max_metrics")]
    pub max_metrics: usize,
}

fn d_max_metrics() -> usize {
    50
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            max_metrics: d_max_metrics(),
        }
    }
}

/// Effective configuration for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "corrdor_params", default)]
    pub corridor: CorridorParams,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(rename = "scaleCorridor", default)]
    pub scale_corridor: bool,
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Unknown top-level keys, kept so the config hash sees them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Config {
    /// Load from a TOML file; missing keys fall back to defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Validate the parameters the envelope builder depends on.
    pub fn validate_corridor(&self) -> std::result::Result<(), CorridorError> {
        if self.corridor.window_size == 0 {
            return Err(CorridorError::Config(
                "corrdor_params.window_size must be positive".to_string(),
            ));
        }
        if self.corridor.margin_percent <= 0.0 {
            return Err(CorridorError::Config(
                "corrdor_params.margin_percent must be positive".to_string(),
            ));
        }
        if self.corridor.step <= 0 {
            return Err(CorridorError::Config(
                "corrdor_params.step must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Split a query at `#` and apply the `;`-separated `key=value`
    /// overrides to a copy of this config. The shared config is never
    /// mutated. Returns the clean query and the effective config.
    pub fn with_query_overrides(
        &self,
        query: &str,
    ) -> std::result::Result<(String, Config), CorridorError> {
        let Some((clean, overrides)) = query.split_once('#') else {
            return Ok((query.to_string(), self.clone()));
        };

        let mut value = serde_json::to_value(self)
            .map_err(|e| CorridorError::Config(format!("config serialization: {e}")))?;

        for pair in overrides.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((key, raw)) = pair.split_once('=') else {
                return Err(CorridorError::Config(format!(
                    "malformed override '{pair}' (expected key=value)"
                )));
            };
            set_dotted(&mut value, key.trim(), parse_override_value(raw.trim()));
        }

        let effective: Config = serde_json::from_value(value)
            .map_err(|e| CorridorError::Config(format!("invalid override: {e}")))?;
        Ok((clean.to_string(), effective))
    }

    /// Stable hash of the effective config (see module docs).
    pub fn hash(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        let canonical = canonical_config_json(&value);
        let mut hasher = Md5::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Parse an override value: bool, comma list, int, float, then string.
fn parse_override_value(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if raw.contains(',') {
        return Value::Array(
            raw.split(',')
                .map(|part| parse_override_value(part.trim()))
                .collect(),
        );
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

/// Set `value[a][b][c] = leaf` for a dotted key `a.b.c`, creating
/// intermediate objects as needed.
fn set_dotted(value: &mut Value, dotted: &str, leaf: Value) {
    match dotted.split_once('.') {
        None => {
            if let Value::Object(map) = value {
                map.insert(dotted.to_string(), leaf);
            }
        }
        Some((head, rest)) => {
            let Value::Object(map) = value else { return };
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if !child.is_object() {
                *child = Value::Object(serde_json::Map::new());
            }
            set_dotted(child, rest, leaf);
        }
    }
}

/// Canonical JSON for hashing: top-level `save*` keys stripped, floats
/// rounded to 5 decimals. serde_json's default map is BTree-backed, so
/// object keys serialize sorted at every level.
pub fn canonical_config_json(value: &Value) -> String {
    let mut rounded = round_floats(value);
    if let Value::Object(map) = &mut rounded {
        map.retain(|key, _| !key.starts_with("save"));
    }
    serde_json::to_string(&rounded).unwrap_or_else(|_| "null".to_string())
}

fn round_floats(value: &Value) -> Value {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if n.is_f64() {
                    let r = (f * 1e5).round() / 1e5;
                    return serde_json::Number::from_f64(r)
                        .map(Value::Number)
                        .unwrap_or(Value::Null);
                }
            }
            value.clone()
        }
        Value::Array(items) => Value::Array(items.iter().map(round_floats).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), round_floats(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

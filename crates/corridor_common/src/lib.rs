//! Corridor core - DFT anomaly corridors for dashboard panels
//!
//! Synthesizes an anomaly corridor (upper and lower bounds) per time
//! series from a long historical window, compares live values against it,
//! and derives per-direction anomaly statistics plus integral concern
//! scalars, all in Prometheus `query_range` response shape.
//!
//! Pipeline per request:
//! - group raw samples by label set and resample onto a uniform grid
//! - on recompute: envelope bounds, DFT detrend/select, historical stats,
//!   persist to the SQLite cache
//! - restore the corridor over the requested window, enforce minimum
//!   width, compute current stats and concern scalars
//!
//! The crate is pure library code: the HTTP surface and the upstream
//! client live behind the [`datasource::DataSource`] trait.

pub mod anomaly;
pub mod bounds;
pub mod cache;
pub mod config;
pub mod datasource;
pub mod dft;
pub mod error;
pub mod formatter;
pub mod grouper;
pub mod orchestrator;
pub mod perf;
pub mod types;
pub mod width;

pub use cache::{CacheStats, CleanupStats, PersistentCache};
pub use config::{Config, CorridorParams, DefaultPercentiles};
pub use datasource::{DataSource, RawSample};
pub use error::{CorridorError, Result};
pub use formatter::{format_matrix, QueryRangeResponse};
pub use orchestrator::{ConcernScores, MetricResult, StatsPipeline};
pub use perf::PerfRecorder;
pub use types::{
    labels_fingerprint, AnomalyStats, BoundaryCurve, CacheEntry, CombinedStats, CorridorSpec,
    Direction, DirectionStats, Harmonic, LabelSet, Sample, TrendLine,
};

//! Upstream data-source boundary.
//!
//! The pipeline never talks HTTP itself; anything that can list metrics and
//! answer range queries can drive it. Timestamps arrive as local-time
//! strings and are parsed back to epoch seconds here.

use chrono::{Local, NaiveDateTime, TimeZone};
use std::collections::HashMap;

use crate::error::Result;

/// One raw point as returned by the upstream.
#[derive(Debug, Clone)]
pub struct RawSample {
    /// `"YYYY-MM-DD HH:MM:SS"`, local time.
    pub time: String,
    pub value: f64,
    /// Must include a synthetic `__name__`; may include `panel_url`.
    pub labels: HashMap<String, String>,
}

/// Abstract upstream: a Grafana panel walker, a Prometheus proxy, or a
/// test fixture.
pub trait DataSource {
    fn list_metrics(&self) -> Result<Vec<String>>;

    fn query_range(
        &self,
        metric: &str,
        start_sec: i64,
        end_sec: i64,
        step_sec: i64,
    ) -> Result<Vec<RawSample>>;
}

/// Parse an upstream timestamp to epoch seconds. Returns `None` for
/// malformed input or local times that do not exist (DST gaps).
pub fn parse_local_timestamp(raw: &str) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
}

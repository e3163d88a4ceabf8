//! SQLite-backed persistent result cache.
//!
//! Two tables: `queries` (one row per query string) and `dft_cache` (one
//! row per `(query, labels fingerprint)`), storing coefficients, trends and
//! historical anomaly stats as canonical JSON in TEXT columns.
//!
//! Startup creates the schema when absent and otherwise applies additive
//! column migrations discovered via `PRAGMA table_info`. Migrations are
//! idempotent. Saves are transactional; readers never observe a partially
//! written row.

use md5::{Digest, Md5};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{CorridorError, Result};
use crate::types::{BoundaryCurve, CacheEntry};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS queries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL UNIQUE,
    custom_params TEXT,
    config_hash TEXT,
    last_accessed INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queries_query ON queries(query);

CREATE TABLE IF NOT EXISTS dft_cache (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_id INTEGER NOT NULL,
    metric_hash TEXT NOT NULL,
    metric_json TEXT NOT NULL,
    data_start INTEGER NOT NULL,
    step INTEGER NOT NULL,
    total_duration INTEGER NOT NULL,
    dft_rebuild_count INTEGER NOT NULL,
    labels_json TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    anomaly_stats_json TEXT NOT NULL,
    dft_upper_json TEXT NOT NULL,
    dft_lower_json TEXT NOT NULL,
    upper_trend_json TEXT NOT NULL DEFAULT '{}',
    lower_trend_json TEXT NOT NULL DEFAULT '{}',
    last_accessed INTEGER NOT NULL,
    UNIQUE(query_id, metric_hash)
);

CREATE INDEX IF NOT EXISTS idx_dft_cache_query_id ON dft_cache(query_id);
CREATE INDEX IF NOT EXISTS idx_dft_cache_metric_hash ON dft_cache(metric_hash);
"#;

/// Rows removed by one maintenance sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupStats {
    pub entries_removed: usize,
    pub queries_removed: usize,
}

/// Aggregate counts for inspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub query_count: u64,
    pub entry_count: u64,
    pub placeholder_count: u64,
}

/// The persistent result cache. One connection, shared by all components
/// within a request; only this type mutates it.
pub struct PersistentCache {
    conn: Connection,
}

fn metric_hash(fingerprint: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(fingerprint.as_bytes());
    hex::encode(hasher.finalize())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut columns = Vec::new();
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        columns.push(name);
    }
    Ok(columns)
}

impl PersistentCache {
    /// Open or create the cache database, applying schema migrations.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory cache for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Additive column migrations, discovered by inspection. Safe to run
    /// on every startup.
    fn migrate(conn: &Connection) -> Result<()> {
        let query_cols = table_columns(conn, "queries")?;
        if !query_cols.iter().any(|c| c == "custom_params") {
            info!("migrating cache schema: queries.custom_params");
            conn.execute("ALTER TABLE queries ADD COLUMN custom_params TEXT", [])?;
        }
        if !query_cols.iter().any(|c| c == "config_hash") {
            info!("migrating cache schema: queries.config_hash");
            conn.execute("ALTER TABLE queries ADD COLUMN config_hash TEXT", [])?;
        }

        let cache_cols = table_columns(conn, "dft_cache")?;
        for column in ["upper_trend_json", "lower_trend_json"] {
            if !cache_cols.iter().any(|c| c == column) {
                info!("migrating cache schema: dft_cache.{column}");
                conn.execute(
                    &format!("ALTER TABLE dft_cache ADD COLUMN {column} TEXT NOT NULL DEFAULT '{{}}'"),
                    [],
                )?;
            }
        }
        Ok(())
    }

    /// Insert or replace the entry for `(query, fingerprint)` inside a
    /// transaction. The query row's `config_hash` follows the entry.
    pub fn save(&self, query: &str, fingerprint: &str, entry: &CacheEntry) -> Result<()> {
        // open a transaction only when not already inside one
        if self.conn.is_autocommit() {
            let tx = self.conn.unchecked_transaction()?;
            Self::save_row(&tx, query, fingerprint, entry)?;
            tx.commit()?;
        } else {
            Self::save_row(&self.conn, query, fingerprint, entry)?;
        }
        Ok(())
    }

    fn save_row(conn: &Connection, query: &str, fingerprint: &str, entry: &CacheEntry) -> Result<()> {
        conn.execute(
            "INSERT INTO queries (query, config_hash, last_accessed, created_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(query) DO UPDATE SET
                 config_hash = excluded.config_hash,
                 last_accessed = excluded.last_accessed",
            params![query, entry.config_hash, entry.last_accessed],
        )?;
        let query_id: i64 =
            conn.query_row("SELECT id FROM queries WHERE query = ?1", [query], |row| {
                row.get(0)
            })?;

        conn.execute(
            "INSERT OR REPLACE INTO dft_cache (
                 query_id, metric_hash, metric_json, data_start, step,
                 total_duration, dft_rebuild_count, labels_json, created_at,
                 anomaly_stats_json, dft_upper_json, dft_lower_json,
                 upper_trend_json, lower_trend_json, last_accessed
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                query_id,
                metric_hash(fingerprint),
                fingerprint,
                entry.data_start,
                entry.step,
                entry.total_duration,
                entry.dft_rebuild_count as i64,
                serde_json::to_string(&entry.labels)?,
                entry.created_at,
                serde_json::to_string(&entry.anomaly_stats)?,
                serde_json::to_string(&entry.dft_upper.coeffs)?,
                serde_json::to_string(&entry.dft_lower.coeffs)?,
                serde_json::to_string(&entry.dft_upper.trend)?,
                serde_json::to_string(&entry.dft_lower.trend)?,
                entry.last_accessed,
            ],
        )?;
        debug!(query, fingerprint, "cache entry persisted");
        Ok(())
    }

    /// Load the entry for `(query, fingerprint)`; `None` on miss.
    pub fn load(&self, query: &str, fingerprint: &str) -> Result<Option<CacheEntry>> {
        let result = self.conn.query_row(
            "SELECT dc.data_start, dc.step, dc.total_duration, dc.dft_rebuild_count,
                    dc.labels_json, dc.created_at, q.config_hash,
                    dc.anomaly_stats_json, dc.dft_upper_json, dc.dft_lower_json,
                    dc.upper_trend_json, dc.lower_trend_json, dc.last_accessed
             FROM dft_cache dc
             JOIN queries q ON q.id = dc.query_id
             WHERE q.query = ?1 AND dc.metric_hash = ?2",
            params![query, metric_hash(fingerprint)],
            row_to_entry,
        );
        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(CorridorError::CacheStore(e)),
        }
    }

    /// All entries for a query, keyed by fingerprint.
    pub fn load_all(
        &self,
        query: &str,
    ) -> Result<std::collections::BTreeMap<String, CacheEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT dc.data_start, dc.step, dc.total_duration, dc.dft_rebuild_count,
                    dc.labels_json, dc.created_at, q.config_hash,
                    dc.anomaly_stats_json, dc.dft_upper_json, dc.dft_lower_json,
                    dc.upper_trend_json, dc.lower_trend_json, dc.last_accessed,
                    dc.metric_json
             FROM dft_cache dc
             JOIN queries q ON q.id = dc.query_id
             WHERE q.query = ?1",
        )?;
        let rows = stmt.query_map([query], |row| {
            let fingerprint: String = row.get(13)?;
            Ok((fingerprint, row_to_entry(row)?))
        })?;

        let mut entries = std::collections::BTreeMap::new();
        for row in rows {
            let (fingerprint, entry) = row?;
            entries.insert(fingerprint, entry);
        }
        Ok(entries)
    }

    pub fn exists(&self, query: &str, fingerprint: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM dft_cache dc
             JOIN queries q ON q.id = dc.query_id
             WHERE q.query = ?1 AND dc.metric_hash = ?2",
            params![query, metric_hash(fingerprint)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Decide whether the entry must be recomputed.
    ///
    /// False iff the entry exists, is within `max_ttl`, and either carries
    /// the current config hash or is a placeholder (placeholders stay
    /// authoritative until they expire, regardless of hash).
    pub fn should_recreate(
        &self,
        query: &str,
        fingerprint: &str,
        config_hash: &str,
        max_ttl: i64,
        now: i64,
    ) -> Result<bool> {
        let Some(entry) = self.load(query, fingerprint)? else {
            return Ok(true);
        };
        let fresh = entry.age_seconds(now) <= max_ttl;
        if entry.is_placeholder() {
            return Ok(!fresh);
        }
        Ok(!(fresh && entry.config_hash == config_hash))
    }

    /// Remember the raw override string a query was last requested with.
    pub fn set_custom_params(&self, query: &str, custom_params: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE queries SET custom_params = ?1 WHERE query = ?2",
            params![custom_params, query],
        )?;
        Ok(())
    }

    /// Refresh `last_accessed`, but only when the wall-clock hour changed
    /// since the stored value (coarse hourly touch keeps writes cheap).
    pub fn touch(&self, query: &str, fingerprint: &str, now: i64) -> Result<()> {
        let stored: Option<i64> = match self.conn.query_row(
            "SELECT dc.last_accessed FROM dft_cache dc
             JOIN queries q ON q.id = dc.query_id
             WHERE q.query = ?1 AND dc.metric_hash = ?2",
            params![query, metric_hash(fingerprint)],
            |row| row.get(0),
        ) {
            Ok(v) => Some(v),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(CorridorError::CacheStore(e)),
        };
        let Some(stored) = stored else {
            return Ok(());
        };
        if stored / 3600 == now / 3600 {
            return Ok(());
        }
        self.conn.execute(
            "UPDATE dft_cache SET last_accessed = ?1
             WHERE metric_hash = ?2
               AND query_id = (SELECT id FROM queries WHERE query = ?3)",
            params![now, metric_hash(fingerprint), query],
        )?;
        self.conn.execute(
            "UPDATE queries SET last_accessed = ?1 WHERE query = ?2",
            params![now, query],
        )?;
        Ok(())
    }

    /// Delete entries not accessed for `max_age_days`, then drop query
    /// rows left without entries.
    pub fn cleanup(&self, max_age_days: i64) -> Result<CleanupStats> {
        let now = chrono::Utc::now().timestamp();
        let cutoff = now - max_age_days * 86_400;
        let entries_removed = self.conn.execute(
            "DELETE FROM dft_cache WHERE last_accessed < ?1",
            params![cutoff],
        )?;
        let queries_removed = self.conn.execute(
            "DELETE FROM queries WHERE id NOT IN (SELECT DISTINCT query_id FROM dft_cache)",
            [],
        )?;
        if entries_removed + queries_removed > 0 {
            info!(entries_removed, queries_removed, "cache sweep complete");
        }
        Ok(CleanupStats {
            entries_removed,
            queries_removed,
        })
    }

    /// Row counts for inspection.
    pub fn stats(&self) -> Result<CacheStats> {
        let query_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM queries", [], |row| row.get(0))?;
        let entry_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM dft_cache", [], |row| row.get(0))?;
        let placeholder_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM dft_cache WHERE labels_json LIKE '%\"unused_metric\":\"true\"%'",
            [],
            |row| row.get(0),
        )?;
        Ok(CacheStats {
            query_count: query_count as u64,
            entry_count: entry_count as u64,
            placeholder_count: placeholder_count as u64,
        })
    }

    /// Warn when a key has been rebuilt suspiciously often.
    pub fn warn_on_rebuild_churn(&self, query: &str, entry: &CacheEntry, max_rebuild_count: u64) {
        if entry.dft_rebuild_count > max_rebuild_count {
            warn!(
                query,
                rebuilds = entry.dft_rebuild_count,
                max = max_rebuild_count,
                "cache entry rebuilt more often than expected"
            );
        }
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheEntry> {
    let labels_json: String = row.get(4)?;
    let config_hash: Option<String> = row.get(6)?;
    let stats_json: String = row.get(7)?;
    let upper_json: String = row.get(8)?;
    let lower_json: String = row.get(9)?;
    let upper_trend_json: String = row.get(10)?;
    let lower_trend_json: String = row.get(11)?;

    Ok(CacheEntry {
        data_start: row.get(0)?,
        step: row.get(1)?,
        total_duration: row.get(2)?,
        dft_rebuild_count: row.get::<_, i64>(3)? as u64,
        labels: serde_json::from_str(&labels_json).unwrap_or_default(),
        created_at: row.get(5)?,
        config_hash: config_hash.unwrap_or_default(),
        anomaly_stats: serde_json::from_str(&stats_json).unwrap_or_default(),
        dft_upper: BoundaryCurve {
            coeffs: serde_json::from_str(&upper_json).unwrap_or_default(),
            trend: serde_json::from_str(&upper_trend_json).unwrap_or_default(),
        },
        dft_lower: BoundaryCurve {
            coeffs: serde_json::from_str(&lower_json).unwrap_or_default(),
            trend: serde_json::from_str(&lower_trend_json).unwrap_or_default(),
        },
        last_accessed: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{Harmonic, LabelSet, TrendLine};
    use tempfile::NamedTempFile;

    fn sample_entry(now: i64, config_hash: &str) -> CacheEntry {
        let mut labels = LabelSet::new();
        labels.insert("job".to_string(), "api".to_string());
        CacheEntry {
            data_start: 1_700_000_000,
            step: 60,
            total_duration: 86_400,
            dft_rebuild_count: 1,
            labels,
            created_at: now,
            config_hash: config_hash.to_string(),
            anomaly_stats: Default::default(),
            dft_upper: BoundaryCurve {
                coeffs: vec![Harmonic {
                    k: 0,
                    amplitude: 12.5,
                    phase: 0.0,
                }],
                trend: TrendLine {
                    slope: 0.001,
                    intercept: 3.0,
                },
            },
            dft_lower: BoundaryCurve {
                coeffs: vec![Harmonic {
                    k: 0,
                    amplitude: 2.5,
                    phase: 0.0,
                }],
                trend: TrendLine {
                    slope: 0.001,
                    intercept: -3.0,
                },
            },
            last_accessed: now,
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let cache = PersistentCache::open_in_memory().unwrap();
        let entry = sample_entry(1_700_000_000, "abc");
        cache.save("up", r#"{"job":"api"}"#, &entry).unwrap();

        let loaded = cache.load("up", r#"{"job":"api"}"#).unwrap().unwrap();
        assert_eq!(loaded.data_start, entry.data_start);
        assert_eq!(loaded.step, 60);
        assert_eq!(loaded.config_hash, "abc");
        assert_eq!(loaded.dft_upper.coeffs.len(), 1);
        assert!((loaded.dft_upper.trend.slope - 0.001).abs() < 1e-12);
        assert_eq!(loaded.labels.get("job").unwrap(), "api");
    }

    #[test]
    fn test_load_miss_is_none() {
        let cache = PersistentCache::open_in_memory().unwrap();
        assert!(cache.load("up", "{}").unwrap().is_none());
        assert!(!cache.exists("up", "{}").unwrap());
    }

    #[test]
    fn test_save_is_idempotent_replace() {
        let cache = PersistentCache::open_in_memory().unwrap();
        let entry = sample_entry(1_700_000_000, "abc");
        cache.save("up", "{}", &entry).unwrap();
        cache.save("up", "{}", &entry).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.query_count, 1);
        let loaded = cache.load("up", "{}").unwrap().unwrap();
        assert_eq!(loaded.dft_rebuild_count, 1);
    }

    #[test]
    fn test_load_all_keyed_by_fingerprint() {
        let cache = PersistentCache::open_in_memory().unwrap();
        cache
            .save("up", r#"{"job":"api"}"#, &sample_entry(1, "h"))
            .unwrap();
        cache
            .save("up", r#"{"job":"db"}"#, &sample_entry(1, "h"))
            .unwrap();
        let all = cache.load_all("up").unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.contains_key(r#"{"job":"api"}"#));
    }

    #[test]
    fn test_should_recreate_on_config_change() {
        let cache = PersistentCache::open_in_memory().unwrap();
        let config = Config::default();
        let now = 1_700_000_000;
        let entry = sample_entry(now, &config.hash());
        cache.save("up", "{}", &entry).unwrap();

        let max_ttl = config.cache.database.max_ttl;
        assert!(!cache
            .should_recreate("up", "{}", &config.hash(), max_ttl, now + 60)
            .unwrap());

        // corridor parameter change invalidates
        let (_, changed) = config
            .with_query_overrides("q#corrdor_params.window_size=99")
            .unwrap();
        assert!(cache
            .should_recreate("up", "{}", &changed.hash(), max_ttl, now + 60)
            .unwrap());

        // save-prefixed keys do not
        let (_, saved) = config.with_query_overrides("q#save_foo=bar").unwrap();
        assert!(!cache
            .should_recreate("up", "{}", &saved.hash(), max_ttl, now + 60)
            .unwrap());

        // expiry invalidates regardless of hash
        assert!(cache
            .should_recreate("up", "{}", &config.hash(), max_ttl, now + max_ttl + 1)
            .unwrap());
    }

    #[test]
    fn test_placeholder_sticky_until_ttl() {
        let cache = PersistentCache::open_in_memory().unwrap();
        let now = 1_700_000_000;
        let entry = CacheEntry::placeholder(LabelSet::new(), "old-hash".to_string(), now);
        cache.save("up", "{}", &entry).unwrap();

        // fresh placeholder wins for any config hash
        assert!(!cache
            .should_recreate("up", "{}", "completely-different", 3600, now + 100)
            .unwrap());
        // expired placeholder is recomputed
        assert!(cache
            .should_recreate("up", "{}", "completely-different", 3600, now + 3601)
            .unwrap());
    }

    #[test]
    fn test_custom_params_recorded() {
        let cache = PersistentCache::open_in_memory().unwrap();
        cache.save("up", "{}", &sample_entry(1, "h")).unwrap();
        cache
            .set_custom_params("up", "corrdor_params.step=30")
            .unwrap();
        let stored: Option<String> = cache
            .conn
            .query_row(
                "SELECT custom_params FROM queries WHERE query = 'up'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored.as_deref(), Some("corrdor_params.step=30"));
    }

    #[test]
    fn test_touch_is_hourly() {
        let cache = PersistentCache::open_in_memory().unwrap();
        let now = 1_700_000_000;
        let entry = sample_entry(now, "h");
        cache.save("up", "{}", &entry).unwrap();

        // same hour: no write
        cache.touch("up", "{}", now + 60).unwrap();
        assert_eq!(cache.load("up", "{}").unwrap().unwrap().last_accessed, now);

        // next hour: refreshed
        cache.touch("up", "{}", now + 3600).unwrap();
        assert_eq!(
            cache.load("up", "{}").unwrap().unwrap().last_accessed,
            now + 3600
        );
    }

    #[test]
    fn test_cleanup_sweeps_old_entries_and_dangling_queries() {
        let cache = PersistentCache::open_in_memory().unwrap();
        let ancient = 1_000_000; // 1970, long past any cutoff
        let mut old = sample_entry(ancient, "h");
        old.last_accessed = ancient;
        cache.save("stale_query", "{}", &old).unwrap();

        let fresh = sample_entry(chrono::Utc::now().timestamp(), "h");
        cache.save("live_query", "{}", &fresh).unwrap();

        let removed = cache.cleanup(30).unwrap();
        assert_eq!(removed.entries_removed, 1);
        assert_eq!(removed.queries_removed, 1);
        assert!(cache.load("stale_query", "{}").unwrap().is_none());
        assert!(cache.load("live_query", "{}").unwrap().is_some());
    }

    #[test]
    fn test_migration_adds_trend_columns() {
        // simulate a database created before trend columns existed
        let tmp = NamedTempFile::new().unwrap();
        {
            let conn = Connection::open(tmp.path()).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE queries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    query TEXT NOT NULL UNIQUE,
                    last_accessed INTEGER NOT NULL,
                    created_at INTEGER NOT NULL
                );
                CREATE TABLE dft_cache (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    query_id INTEGER NOT NULL,
                    metric_hash TEXT NOT NULL,
                    metric_json TEXT NOT NULL,
                    data_start INTEGER NOT NULL,
                    step INTEGER NOT NULL,
                    total_duration INTEGER NOT NULL,
                    dft_rebuild_count INTEGER NOT NULL,
                    labels_json TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    anomaly_stats_json TEXT NOT NULL,
                    dft_upper_json TEXT NOT NULL,
                    dft_lower_json TEXT NOT NULL,
                    last_accessed INTEGER NOT NULL,
                    UNIQUE(query_id, metric_hash)
                );
                INSERT INTO queries (query, last_accessed, created_at)
                    VALUES ('legacy', 100, 100);
                INSERT INTO dft_cache (
                    query_id, metric_hash, metric_json, data_start, step,
                    total_duration, dft_rebuild_count, labels_json, created_at,
                    anomaly_stats_json, dft_upper_json, dft_lower_json, last_accessed
                ) VALUES (1, '99914b932bd37a50b983c5e7c90ae93b', '{}', 0, 60, 0, 1,
                          '{}', 100, '{}', '[]', '[]', 100);
                "#,
            )
            .unwrap();
        }

        let cache = PersistentCache::open_at(tmp.path()).unwrap();
        let cols = table_columns(&cache.conn, "dft_cache").unwrap();
        assert!(cols.iter().any(|c| c == "upper_trend_json"));
        assert!(cols.iter().any(|c| c == "lower_trend_json"));
        let qcols = table_columns(&cache.conn, "queries").unwrap();
        assert!(qcols.iter().any(|c| c == "custom_params"));
        assert!(qcols.iter().any(|c| c == "config_hash"));

        // legacy row survives with zeroed trends
        let entry = cache.load("legacy", "{}").unwrap();
        assert!(entry.is_some());
        assert!(entry.unwrap().dft_upper.trend.is_zero());

        // opening again is a no-op
        drop(cache);
        assert!(PersistentCache::open_at(tmp.path()).is_ok());
    }
}

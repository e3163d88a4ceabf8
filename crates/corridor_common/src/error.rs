//! Error kinds for the corridor pipeline.
//!
//! Policy:
//! - `Config` is fatal to the current request and never mutates the cache.
//! - `DataSource` fails the request (502-equivalent upstream).
//! - `CacheStore` is recoverable: the request proceeds without persisting
//!   and a later request retries.
//!
//! In-core algorithms are total: empty input yields zero-valued stats or
//! empty series, never an error. Only the boundaries (DB, upstream) surface
//! failures.

/// Errors surfaced by the corridor core
#[derive(Debug, thiserror::Error)]
pub enum CorridorError {
    #[error("invalid corridor configuration: {0}")]
    Config(String),

    #[error("data source request failed: {0}")]
    DataSource(String),

    #[error("cache store failure: {0}")]
    CacheStore(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, CorridorError>;

impl CorridorError {
    /// Whether the request may continue without this operation's result
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CorridorError::CacheStore(_))
    }
}

impl From<serde_json::Error> for CorridorError {
    fn from(e: serde_json::Error) -> Self {
        CorridorError::CacheStore(rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
    }
}

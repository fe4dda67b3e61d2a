//! Crate-wide error taxonomy.
//!
//! Every public entry point returns [`DuckPgError`]. Sub-modules define
//! focused error enums (`pool::PoolError`, `config::ConfigError`, ...) and
//! this type unifies them with `#[from]`, following the same shape as the
//! teacher's `WorkerError` / `SettingsError` split: local errors stay
//! specific for callers who match on them directly, and bubble up here for
//! callers who just want one `Result` alias.

use thiserror::Error;

use crate::config::ConfigError;
use crate::pool::PoolError;

/// Result alias used throughout the crate.
pub type DuckPgResult<T> = Result<T, DuckPgError>;

/// Stable error taxonomy (spec §7).
#[derive(Debug, Error)]
pub enum DuckPgError {
    /// Invalid attach options. Fatal to driver creation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The underlying engine could not be opened.
    #[error("connection failed: {0}")]
    Connection(#[source] duckdb::Error),

    /// `acquire` exceeded the configured timeout.
    #[error("timed out waiting for a pooled connection")]
    PoolTimeout,

    /// `acquire` or `release` after `close`.
    #[error("pool is closed")]
    PoolClosed,

    /// A binding used a disallowed PostgreSQL JSON/JSONB type.
    #[error("unsupported column type: {0}; use duckpg::codec::Value::Json instead")]
    UnsupportedColumn(String),

    /// A nested `transaction()` call could not use a savepoint.
    #[error("nested transactions are not supported by this engine")]
    NestedTransactionUnsupported,

    /// Any error raised by the engine during execute/compile/commit/rollback.
    #[error("engine error executing `{sql}`: {source}")]
    Engine {
        sql: String,
        #[source]
        source: duckdb::Error,
    },

    /// A migration's SQL failed to apply; rolled back with all of this run's
    /// pending migrations.
    #[error("migration `{name}` failed: {source}")]
    Migration {
        name: String,
        #[source]
        source: Box<DuckPgError>,
    },

    /// The migration journal or a migration's SQL file could not be read
    /// from disk. Ambient addition alongside spec §7's taxonomy — the spec
    /// only specifies the transactional-apply error path, not the
    /// filesystem layer in front of it.
    #[error("failed to read migration file at {path}: {source}")]
    MigrationIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<PoolError> for DuckPgError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Timeout => DuckPgError::PoolTimeout,
            PoolError::Closed => DuckPgError::PoolClosed,
            PoolError::Connection(e) => DuckPgError::Connection(e),
        }
    }
}

impl DuckPgError {
    /// Attach the rewritten SQL that was executing when an engine error
    /// occurred, per spec §7 ("Forwarded with rewritten SQL attached for
    /// diagnostics").
    pub fn engine(sql: impl Into<String>, source: duckdb::Error) -> Self {
        DuckPgError::Engine {
            sql: sql.into(),
            source,
        }
    }
}

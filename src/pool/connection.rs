//! Pool connection trait and the real DuckDB-backed connection (spec §3
//! "Connection").
//!
//! The prepared-statement cache (spec §4.3) nominally lives on each
//! connection, but `duckdb::Statement<'conn>` borrows its connection, so
//! holding a compiled handle across `.await` points would need unsafe
//! self-referencing. Instead, engine-level statement reuse is delegated to
//! DuckDB's own prepared-statement cache (`Connection::prepare_cached`,
//! mirroring `rusqlite`'s cache, which this crate's underlying engine
//! binding follows); `codec::StatementCache` tracks the same
//! `(sql, fingerprint)` keys purely for bookkeeping so hit/miss behavior
//! matches spec §4.3's contract shape, and its capacity is kept in sync
//! with the engine cache's.

use std::time::Instant;

use crate::codec::{ParamFingerprint, StatementCache};

/// Minimal capability a pooled connection must offer (spec §3
/// "Connection").
pub trait Conn: Send + 'static {
    fn created_at(&self) -> Instant;
}

/// Bookkeeping entry mirroring spec §4.3's "engine handle; originating
/// rewritten SQL; parameter type fingerprint" — the handle itself is
/// DuckDB's own cached statement, re-acquired by SQL text per call (see
/// module docs).
#[derive(Debug, Clone)]
pub struct CompiledStatement {
    pub sql: String,
}

/// A real DuckDB-backed pooled connection (local file, in-memory, or the
/// `md:` MotherDuck endpoint — spec §6 `path`).
pub struct DuckDbConn {
    pub handle: duckdb::Connection,
    created_at: Instant,
    statements: StatementCache<CompiledStatement>,
}

impl DuckDbConn {
    /// Open a connection per spec §6's `path` semantics: `:memory:` (or
    /// empty) for ephemeral, a file path for persistent, `md:` for the
    /// hosted MotherDuck variant (with the token attached verbatim).
    pub fn open(
        path: &str,
        motherduck_token: Option<&str>,
        prepare_cache_capacity: usize,
    ) -> Result<Self, duckdb::Error> {
        let handle = if path.is_empty() || path == ":memory:" {
            duckdb::Connection::open_in_memory()?
        } else if let Some(database) = path.strip_prefix("md:") {
            let conn = duckdb::Connection::open_in_memory()?;
            let attach_sql = match motherduck_token {
                Some(token) => {
                    format!("ATTACH 'md:{database}?motherduck_token={token}' AS md_target")
                }
                None => format!("ATTACH 'md:{database}' AS md_target"),
            };
            conn.execute_batch(&attach_sql)?;
            conn.execute_batch("USE md_target")?;
            conn
        } else {
            duckdb::Connection::open(path)?
        };

        handle.set_prepared_statement_cache_capacity(prepare_cache_capacity.max(1));

        Ok(Self {
            handle,
            created_at: Instant::now(),
            statements: if prepare_cache_capacity == 0 {
                StatementCache::disabled()
            } else {
                StatementCache::new(prepare_cache_capacity)
            },
        })
    }

    /// Record that `sql`/`fingerprint` has been compiled at least once on
    /// this connection, returning whether it was already present. The
    /// engine handle itself is reused through `prepare_cached`; this only
    /// drives the spec-shaped bookkeeping (and gives the eviction-close
    /// behavior a place to live if this cache is later backed by real
    /// handles).
    pub(crate) fn note_compiled(&mut self, sql: &str, fingerprint: &ParamFingerprint) -> bool {
        let already_cached = self.statements.get_mut(sql, fingerprint).is_some();
        if !already_cached {
            self.statements.insert(
                sql.to_string(),
                fingerprint.clone(),
                CompiledStatement { sql: sql.to_string() },
            );
        }
        already_cached
    }

    pub fn cached_statement_count(&self) -> usize {
        self.statements.len()
    }
}

impl Conn for DuckDbConn {
    fn created_at(&self) -> Instant {
        self.created_at
    }
}

impl std::fmt::Debug for DuckDbConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbConn")
            .field("created_at", &self.created_at)
            .field("cached_statements", &self.statements.len())
            .finish()
    }
}

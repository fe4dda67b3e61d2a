//! `duckpg` — a PostgreSQL-dialect ORM driver adapter for DuckDB and
//! MotherDuck.
//!
//! Three subsystems form the core: [`translate`] (SQL dialect translation),
//! [`pool`] + [`session`] (connection lifecycle and query execution), and
//! [`codec`] (parameter binding and result decoding). [`migrate`] is a
//! thin driver built on top of [`session`]. [`Driver`] is the single entry
//! point embedders construct; everything else is reachable from a
//! [`Session`] it hands out.

pub mod codec;
pub mod config;
pub mod dialect;
pub mod error;
pub mod logging;
pub mod migrate;
pub mod pool;
pub mod session;
pub mod sql;
pub mod translate;

use std::sync::Arc;

use config::{Options, PrepareCacheOption};
use dialect::DialectState;
use error::DuckPgResult;
use pool::{DuckDbConn, Pool};
use session::Session;
use translate::Translator;

/// Default capacity used for the translation cache (spec §4.1); unrelated
/// to the per-connection prepared-statement cache, which is sized from
/// `options.prepare_cache` instead.
const DEFAULT_TRANSLATION_CACHE_CAPACITY: usize = 256;

/// A live attachment to one DuckDB engine (local file, in-memory, or a
/// MotherDuck endpoint), owning the connection pool, the shared
/// translation pipeline, and the shared dialect-capability state (spec.md
/// §2's root object, expanded in SPEC_FULL.md §0).
pub struct Driver {
    pool: Pool<DuckDbConn>,
    translator: Arc<Translator>,
    dialect: Arc<DialectState>,
    options: Options,
}

impl Driver {
    /// Open a driver for `options`. Connections are created lazily by the
    /// pool on first `session()`; this only validates/records the options.
    pub fn open(options: Options) -> Self {
        let prepare_cache_capacity = match options.prepare_cache {
            PrepareCacheOption::Disabled => 0,
            PrepareCacheOption::Enabled { size } => size,
        };

        let path = options.path.clone();
        let token = options.motherduck_token.clone();
        let pool = Pool::new(options.pool, move || {
            let path = path.clone();
            let token = token.clone();
            async move {
                tokio::task::spawn_blocking(move || {
                    DuckDbConn::open(&path, token.as_deref(), prepare_cache_capacity)
                })
                .await
                .expect("connection open task panicked")
            }
        });

        let translator = Arc::new(Translator::new(DEFAULT_TRANSLATION_CACHE_CAPACITY, options.rewrite_arrays));

        Self {
            pool,
            translator,
            dialect: Arc::new(DialectState::new()),
            options,
        }
    }

    /// Check out a session (spec.md §4.4 "Session"). Suspends until a
    /// connection is available or the pool's `acquire_timeout` elapses.
    pub async fn session(&self) -> DuckPgResult<Session> {
        let conn = self.pool.acquire().await?;
        Ok(Session::new(
            conn,
            self.dialect.clone(),
            self.translator.clone(),
            self.options.logger.clone(),
        ))
    }

    /// Close the pool: new `session()` calls fail, pending waiters are
    /// failed, idle connections are dropped (spec §4.2 `close`).
    pub fn close(&self) {
        self.pool.close();
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

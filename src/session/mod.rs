//! Session & transactions (spec §4.4): execute / all / stream operations
//! over a single checked-out connection, transactions with savepoint
//! fallback, and the data-flow glue (translate → prepare → bind → execute
//! → decode) spec §2 describes.

use std::time::Instant;

use crate::codec::{decode_value, encode_params, ParamFingerprint, Value};
use crate::dialect::{DialectState, SavepointSupport};
use crate::error::{DuckPgError, DuckPgResult};
use crate::logging::{QueryEvent, SharedLogger};
use crate::pool::{DuckDbConn, PooledConn};
use crate::translate::Translator;
use std::sync::Arc;

/// One decoded result row: caller-visible values in column order.
pub type Row = Vec<Value>;

/// A batch of row-batch-streamed results (spec §4.4 "row-batch streaming").
pub type RowBatchStream = futures::stream::Iter<std::vec::IntoIter<Vec<Row>>>;

/// A batch of raw columnar buffers (spec §4.4 "raw columnar streaming"):
/// outer index is column, inner is row within the batch.
pub type ColumnBatchStream = futures::stream::Iter<std::vec::IntoIter<Vec<Vec<Value>>>>;

/// Holds a checked-out connection (spec §3 "Session"), the shared
/// translation pipeline and per-driver dialect state, and this session's
/// own transaction-depth / savepoint-sequence bookkeeping.
///
/// DuckDB's client is synchronous under the hood; every operation here is
/// still `async fn` to match spec §5's scheduling model (suspension at
/// acquire/execute/transaction/stream boundaries) and so embedders can
/// interleave sessions on a single-threaded cooperative runtime, but no
/// engine call is offloaded to a blocking thread pool — see
/// [`crate::pool::connection`] for why the prepared-statement handle
/// itself can't outlive a single call without unsafe self-referencing.
pub struct Session {
    conn: Option<PooledConn<DuckDbConn>>,
    dialect: Arc<DialectState>,
    translator: Arc<Translator>,
    logger: SharedLogger,
    tx_depth: u32,
    savepoint_seq: u32,
}

impl Session {
    pub fn new(
        conn: PooledConn<DuckDbConn>,
        dialect: Arc<DialectState>,
        translator: Arc<Translator>,
        logger: SharedLogger,
    ) -> Self {
        Self {
            conn: Some(conn),
            dialect,
            translator,
            logger,
            tx_depth: 0,
            savepoint_seq: 0,
        }
    }

    fn conn_mut(&mut self) -> DuckPgResult<&mut DuckDbConn> {
        Ok(self.conn.as_mut().ok_or(DuckPgError::PoolClosed)?.get_mut())
    }

    /// Mark the held connection dirty, so it is destroyed rather than
    /// returned to the idle pool on release (spec §4.4: cancellation or an
    /// unrecoverable error leaves the session, and therefore the
    /// connection, dirty).
    fn mark_dirty(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.mark_dirty();
        }
    }

    /// Translate `sql` through the shared pipeline (spec §2 data flow).
    fn rewrite(&self, sql: &str) -> String {
        self.translator.translate(sql).sql
    }

    /// Encode parameters and apply the disallowed-PG-JSON check through
    /// the dialect-state flag (spec §4.3 "Disallowed inputs": "the
    /// rejection is surfaced by the dialect state flag set during
    /// type-preparation and checked after the query is built").
    fn prepare_params(&self, params: &[Value]) -> DuckPgResult<Vec<duckdb::types::Value>> {
        self.dialect.begin_prepare();
        let (encoded, disallowed) = encode_params(params);
        if disallowed {
            self.dialect.mark_disallowed_column();
        }
        if self.dialect.disallowed_column_detected() {
            return Err(DuckPgError::UnsupportedColumn(
                "PostgreSQL json/jsonb binding; use duckpg::codec::Value::Json instead".into(),
            ));
        }
        Ok(encoded)
    }

    async fn log(&self, sql: &str, params: &[Value], duration: std::time::Duration) {
        self.logger.on_query(&QueryEvent { sql, params, duration: Some(duration) });
    }

    /// Run a statement for its side effect, returning the number of rows
    /// affected (spec §4.4 `execute`).
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> DuckPgResult<u64> {
        let rewritten = self.rewrite(sql);
        let encoded = self.prepare_params(params)?;
        let fingerprint = ParamFingerprint::of(params);

        let start = Instant::now();
        let conn = self.conn_mut()?;
        conn.note_compiled(&rewritten, &fingerprint);
        let result = conn
            .handle
            .prepare_cached(&rewritten)
            .and_then(|mut stmt| stmt.execute(duckdb::params_from_iter(encoded.iter())));

        match result {
            Ok(rows_changed) => {
                self.log(&rewritten, params, start.elapsed()).await;
                Ok(rows_changed as u64)
            }
            Err(e) => {
                self.mark_dirty();
                Err(DuckPgError::engine(rewritten, e))
            }
        }
    }

    /// Run a statement and decode every resulting row (spec §4.4 `all`).
    pub async fn all(&mut self, sql: &str, params: &[Value]) -> DuckPgResult<Vec<Row>> {
        let rewritten = self.rewrite(sql);
        let encoded = self.prepare_params(params)?;
        let fingerprint = ParamFingerprint::of(params);

        let start = Instant::now();
        let conn = self.conn_mut()?;
        conn.note_compiled(&rewritten, &fingerprint);

        let fetch = || -> Result<Vec<Row>, duckdb::Error> {
            let mut stmt = conn.handle.prepare_cached(&rewritten)?;
            let column_count = stmt.column_count();
            let mut rows = stmt.query(duckdb::params_from_iter(encoded.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    let engine_value: duckdb::types::Value = row.get(i)?;
                    values.push(decode_value(&engine_value));
                }
                out.push(values);
            }
            Ok(out)
        };

        match fetch() {
            Ok(rows) => {
                self.log(&rewritten, params, start.elapsed()).await;
                Ok(rows)
            }
            Err(e) => {
                self.mark_dirty();
                Err(DuckPgError::engine(rewritten, e))
            }
        }
    }

    /// Row-batch streaming (spec §4.4): yields sequences of decoded rows
    /// of `batch_size`. DuckDB's client materializes the full result set
    /// synchronously, so the "cursor" this releases on drop is the
    /// already-buffered `Vec` — abandoning the stream is always
    /// cancel-safe.
    pub async fn stream(
        &mut self,
        sql: &str,
        params: &[Value],
        batch_size: usize,
    ) -> DuckPgResult<RowBatchStream> {
        let rows = self.all(sql, params).await?;
        let batch_size = batch_size.max(1);
        let batches: Vec<Vec<Row>> = rows.chunks(batch_size).map(|c| c.to_vec()).collect();
        Ok(futures::stream::iter(batches))
    }

    /// Raw columnar streaming (spec §4.4): yields per-batch column
    /// buffers instead of row-major sequences.
    pub async fn stream_raw(
        &mut self,
        sql: &str,
        params: &[Value],
        batch_size: usize,
    ) -> DuckPgResult<ColumnBatchStream> {
        let rows = self.all(sql, params).await?;
        let batch_size = batch_size.max(1);
        let batches: Vec<Vec<Vec<Value>>> =
            rows.chunks(batch_size).map(transpose).collect();
        Ok(futures::stream::iter(batches))
    }

    async fn execute_raw(&mut self, sql: &str) -> DuckPgResult<()> {
        let conn = self.conn_mut()?;
        conn.handle
            .execute_batch(sql)
            .map_err(|e| DuckPgError::engine(sql.to_string(), e))
    }

    fn next_savepoint_name(&mut self) -> String {
        self.savepoint_seq += 1;
        format!("sp_{}", self.savepoint_seq)
    }

    /// Run `body` under `BEGIN … COMMIT`, rolling back on any raised
    /// error (spec §4.4). Nested calls are served by savepoints when the
    /// dialect's tri-state allows it.
    pub async fn transaction<T, F, Fut>(&mut self, body: F) -> DuckPgResult<T>
    where
        F: FnOnce(&mut Session) -> Fut,
        Fut: std::future::Future<Output = DuckPgResult<T>>,
    {
        if self.tx_depth == 0 {
            self.execute_raw("BEGIN TRANSACTION").await?;
            self.tx_depth += 1;
            let result = body(self).await;
            self.tx_depth -= 1;
            match result {
                Ok(value) => {
                    self.execute_raw("COMMIT").await?;
                    Ok(value)
                }
                Err(err) => {
                    let _ = self.execute_raw("ROLLBACK").await;
                    Err(err)
                }
            }
        } else {
            self.nested_transaction(body).await
        }
    }

    /// Nested `transaction()` call (spec §4.4): savepoint-backed when
    /// supported, probed on first use when unknown, rejected immediately
    /// once known unsupported.
    async fn nested_transaction<T, F, Fut>(&mut self, body: F) -> DuckPgResult<T>
    where
        F: FnOnce(&mut Session) -> Fut,
        Fut: std::future::Future<Output = DuckPgResult<T>>,
    {
        if self.dialect.savepoint_support() == SavepointSupport::No {
            return Err(DuckPgError::NestedTransactionUnsupported);
        }

        let name = self.next_savepoint_name();
        if self.execute_raw(&format!("SAVEPOINT {name}")).await.is_err() {
            // Engine rejected the savepoint outright: record "no" and mark
            // the outer transaction conservatively for rollback, since we
            // don't know what partial state the rejected SAVEPOINT left
            // behind (spec §4.4, §9).
            self.dialect.set_savepoint_support(SavepointSupport::No);
            self.mark_dirty();
            return Err(DuckPgError::NestedTransactionUnsupported);
        }
        self.dialect.set_savepoint_support(SavepointSupport::Yes);

        self.tx_depth += 1;
        let result = body(self).await;
        self.tx_depth -= 1;

        match result {
            Ok(value) => {
                self.execute_raw(&format!("RELEASE SAVEPOINT {name}")).await?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.execute_raw(&format!("ROLLBACK TO SAVEPOINT {name}")).await;
                let _ = self.execute_raw(&format!("RELEASE SAVEPOINT {name}")).await;
                Err(err)
            }
        }
    }
}

fn transpose(rows: &[Row]) -> Vec<Vec<Value>> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let mut columns: Vec<Vec<Value>> = (0..first.len()).map(|_| Vec::with_capacity(rows.len())).collect();
    for row in rows {
        for (i, value) in row.iter().enumerate() {
            columns[i].push(value.clone());
        }
    }
    columns
}

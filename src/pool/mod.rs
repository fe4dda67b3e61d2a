//! Connection pool (spec §4.2): fixed capacity, FIFO fair acquisition,
//! idle/lifetime eviction, failure isolation, cancellation-safe.
//!
//! The pool's own bookkeeping (`State`) is guarded by a plain
//! [`std::sync::Mutex`] rather than `tokio::sync::Mutex`: every critical
//! section here is a short, synchronous data-structure update, and
//! `release` must never suspend (spec §5). All actual suspension —
//! `acquire`'s wait for a free slot, and the connection factory — happens
//! outside the lock.

mod connection;

pub use connection::{Conn, DuckDbConn};

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::oneshot;

use crate::config::PoolConfig;

/// Pool-local errors (spec §7: `PoolTimeoutError`, `PoolClosedError`), plus
/// the connection-open failure that `acquire` surfaces without consuming
/// capacity.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("timed out waiting for a pooled connection")]
    Timeout,
    #[error("pool is closed")]
    Closed,
    #[error("connection failed: {0}")]
    Connection(#[source] duckdb::Error),
}

type Factory<C> =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<C, duckdb::Error>> + Send>> + Send + Sync>;

struct Idle<C> {
    conn: C,
    idle_since: Instant,
}

struct Waiter<C> {
    tx: oneshot::Sender<Result<C, PoolError>>,
}

struct State<C> {
    idle: VecDeque<Idle<C>>,
    live_count: u32,
    waiters: VecDeque<Waiter<C>>,
    closed: bool,
}

struct PoolInner<C> {
    config: PoolConfig,
    factory: Factory<C>,
    state: Mutex<State<C>>,
}

/// A fixed-capacity pool of connections of type `C`.
///
/// Cheap to clone — internally an `Arc`, matching the teacher's
/// `WorkerClient` handle-sharing pattern.
pub struct Pool<C: Conn> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Conn> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<C: Conn> Pool<C> {
    pub fn new<F, Fut>(config: PoolConfig, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, duckdb::Error>> + Send + 'static,
    {
        Self {
            inner: Arc::new(PoolInner {
                config,
                factory: Arc::new(move || Box::pin(factory())),
                state: Mutex::new(State {
                    idle: VecDeque::new(),
                    live_count: 0,
                    waiters: VecDeque::new(),
                    closed: false,
                }),
            }),
        }
    }

    /// `acquire() -> connection` (spec §4.2). Waiters are served FIFO.
    pub async fn acquire(&self) -> Result<PooledConn<C>, PoolError> {
        loop {
            enum Step<C> {
                Got(C),
                Construct,
                Wait(oneshot::Receiver<Result<C, PoolError>>),
            }

            let step = {
                let mut state = self.inner.state.lock().expect("pool state poisoned");
                if state.closed {
                    return Err(PoolError::Closed);
                }

                if let Some(idle) = state.idle.pop_front() {
                    if self.idle_expired(&idle) || self.lifetime_expired(&idle.conn) {
                        state.live_count -= 1;
                        drop(state);
                        drop(idle);
                        continue;
                    }
                    Step::Got(idle.conn)
                } else if state.live_count < self.inner.config.size {
                    state.live_count += 1;
                    Step::Construct
                } else {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push_back(Waiter { tx });
                    Step::Wait(rx)
                }
            };

            return match step {
                Step::Got(conn) => Ok(self.wrap(conn)),
                Step::Construct => match (self.inner.factory)().await {
                    Ok(conn) => Ok(self.wrap(conn)),
                    Err(e) => {
                        // Failure isolation: give back the capacity slot.
                        let mut state = self.inner.state.lock().expect("pool state poisoned");
                        state.live_count -= 1;
                        Err(PoolError::Connection(e))
                    }
                },
                Step::Wait(rx) => self.await_waiter(rx).await,
            };
        }
    }

    async fn await_waiter(
        &self,
        rx: oneshot::Receiver<Result<C, PoolError>>,
    ) -> Result<PooledConn<C>, PoolError> {
        let result = match self.inner.config.acquire_timeout() {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(inner) => inner.map_err(|_| PoolError::Closed)?,
                Err(_) => return Err(PoolError::Timeout),
            },
            None => rx.await.map_err(|_| PoolError::Closed)?,
        };
        result.map(|conn| self.wrap(conn))
    }

    fn wrap(&self, conn: C) -> PooledConn<C> {
        PooledConn {
            conn: Some(conn),
            pool: self.inner.clone(),
            dirty: false,
        }
    }

    fn idle_expired(&self, idle: &Idle<C>) -> bool {
        self.inner
            .config
            .idle_timeout()
            .is_some_and(|limit| idle.idle_since.elapsed() >= limit)
    }

    fn lifetime_expired(&self, conn: &C) -> bool {
        self.inner
            .config
            .max_lifetime()
            .is_some_and(|limit| conn.created_at().elapsed() >= limit)
    }

    /// `close()` (spec §4.2): blocks new acquisitions, drains waiters with
    /// `PoolError::Closed`, destroys all idle connections. In-use
    /// connections are destroyed as they're released (`release` checks
    /// `closed` too).
    pub fn close(&self) {
        let mut state = self.inner.state.lock().expect("pool state poisoned");
        state.closed = true;
        state.idle.clear();
        for waiter in state.waiters.drain(..) {
            let _ = waiter.tx.send(Err(PoolError::Closed));
        }
    }

    pub fn live_count(&self) -> u32 {
        self.inner.state.lock().expect("pool state poisoned").live_count
    }

    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().expect("pool state poisoned").idle.len()
    }

    fn release(&self, mut conn: C, dirty: bool) {
        let mut state = self.inner.state.lock().expect("pool state poisoned");

        if state.closed || dirty || self.lifetime_expired(&conn) {
            state.live_count -= 1;
            self.wake_waiter_with_replacement(state);
            return;
        }

        loop {
            let Some(waiter) = state.waiters.pop_front() else {
                state.idle.push_back(Idle { conn, idle_since: Instant::now() });
                return;
            };
            match waiter.tx.send(Ok(conn)) {
                Ok(()) => return,
                Err(Ok(returned)) => conn = returned,
                Err(Err(_)) => unreachable!("we only ever send Ok to waiters"),
            }
        }
    }

    /// Called after a connection was destroyed rather than returned to
    /// idle (closed/dirty/lifetime-expired). A destroyed connection frees a
    /// capacity slot, but a FIFO waiter parked in [`Pool::await_waiter`] is
    /// only ever woken by a `tx.send` — without this, a waiter queued
    /// behind a connection that errors out (spec §4.4: `mark_dirty` on
    /// engine error) would block forever even though capacity is
    /// available. Reserves the freed slot and constructs the waiter's
    /// replacement connection on a spawned task, since `release` itself
    /// must not suspend (spec §5).
    fn wake_waiter_with_replacement(&self, mut state: std::sync::MutexGuard<'_, State<C>>) {
        if state.closed || state.live_count >= self.inner.config.size {
            return;
        }
        let Some(waiter) = state.waiters.pop_front() else {
            return;
        };
        state.live_count += 1;
        drop(state);

        let factory = self.inner.factory.clone();
        let pool = self.clone();
        tokio::spawn(async move {
            match factory().await {
                Ok(conn) => {
                    if let Err(Ok(returned)) = waiter.tx.send(Ok(conn)) {
                        // Waiter was cancelled between being popped and the
                        // connection finishing construction; don't leak it
                        // — feed it back through the normal release path so
                        // the next waiter (or idle) picks it up.
                        pool.release(returned, false);
                    }
                }
                Err(e) => {
                    // Failure isolation (spec §4.2): give back the slot we
                    // reserved above.
                    let mut state = pool.inner.state.lock().expect("pool state poisoned");
                    state.live_count -= 1;
                    drop(state);
                    let _ = waiter.tx.send(Err(PoolError::Connection(e)));
                }
            }
        });
    }
}

/// A checked-out connection. Released back to its pool on drop — cancelling
/// (dropping) an in-flight operation still releases the connection rather
/// than leaking it.
pub struct PooledConn<C: Conn> {
    conn: Option<C>,
    pool: Arc<PoolInner<C>>,
    dirty: bool,
}

impl<C: Conn> PooledConn<C> {
    pub fn get(&self) -> &C {
        self.conn.as_ref().expect("connection taken before drop")
    }

    pub fn get_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect("connection taken before drop")
    }

    /// Mark this connection for destruction instead of return-to-idle on
    /// release (spec §4.4: a cancelled/errored statement leaves the
    /// session, and therefore the connection, dirty).
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl<C: Conn> Drop for PooledConn<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let pool = Pool { inner: self.pool.clone() };
            pool.release(conn, self.dirty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeConn {
        id: u32,
        created_at: Instant,
    }

    impl Conn for FakeConn {
        fn created_at(&self) -> Instant {
            self.created_at
        }
    }

    fn counting_factory() -> (impl Fn() -> std::future::Ready<Result<FakeConn, duckdb::Error>>, Arc<AtomicU32>) {
        let next_id = Arc::new(AtomicU32::new(0));
        let calls = next_id.clone();
        let factory = move || {
            let id = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(FakeConn { id, created_at: Instant::now() }))
        };
        (factory, next_id)
    }

    #[tokio::test]
    async fn acquire_reuses_released_connections() {
        let (factory, _) = counting_factory();
        let pool = Pool::new(PoolConfig::with_size(1), factory);
        let first_id = {
            let conn = pool.acquire().await.unwrap();
            conn.get().id
        };
        let second_id = pool.acquire().await.unwrap().get().id;
        assert_eq!(first_id, second_id);
    }

    #[tokio::test]
    async fn live_count_never_exceeds_capacity() {
        let (factory, _) = counting_factory();
        let pool = Pool::new(PoolConfig::with_size(2), factory);
        let _a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        assert_eq!(pool.live_count(), 2);
    }

    #[tokio::test]
    async fn factory_failure_does_not_consume_capacity() {
        let attempt = Arc::new(AtomicUsize::new(0));
        let attempt_clone = attempt.clone();
        let pool = Pool::new(PoolConfig::with_size(1), move || {
            let attempt = attempt_clone.clone();
            async move {
                let n = attempt.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(duckdb::Error::InvalidParameterName("boom".to_string()))
                } else {
                    Ok(FakeConn { id: n as u32, created_at: Instant::now() })
                }
            }
        });

        let first = pool.acquire().await;
        assert!(first.is_err());
        assert_eq!(pool.live_count(), 0);

        let second = pool.acquire().await;
        assert!(second.is_ok());
        assert_eq!(attempt.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn idle_timeout_forces_a_fresh_connection() {
        let (factory, _) = counting_factory();
        let mut config = PoolConfig::with_size(1);
        config.idle_timeout_ms = Some(1);
        let pool = Pool::new(config, factory);

        let first_id = pool.acquire().await.unwrap().get().id;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second_id = pool.acquire().await.unwrap().get().id;
        assert_ne!(first_id, second_id);
    }

    #[tokio::test]
    async fn waiters_are_served_fifo() {
        let (factory, _) = counting_factory();
        let pool = Pool::new(PoolConfig::with_size(1), factory);
        let held = pool.acquire().await.unwrap();

        let pool_a = pool.clone();
        let pool_b = pool.clone();
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_a = order.clone();
        let order_b = order.clone();

        let task_a = tokio::spawn(async move {
            let conn = pool_a.acquire().await.unwrap();
            order_a.lock().unwrap().push('a');
            drop(conn);
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let task_b = tokio::spawn(async move {
            let conn = pool_b.acquire().await.unwrap();
            order_b.lock().unwrap().push('b');
            drop(conn);
        });
        tokio::time::sleep(Duration::from_millis(5)).await;

        drop(held);
        task_a.await.unwrap();
        task_b.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!['a', 'b']);
    }

    #[tokio::test]
    async fn dirty_release_wakes_a_queued_waiter_with_a_fresh_connection() {
        let (factory, _) = counting_factory();
        let pool = Pool::new(PoolConfig::with_size(1), factory);
        let mut held = pool.acquire().await.unwrap();
        let first_id = held.get().id;

        let pool_clone = pool.clone();
        let waiter = tokio::spawn(async move { pool_clone.acquire().await });
        tokio::time::sleep(Duration::from_millis(5)).await;

        held.mark_dirty();
        drop(held);

        // Before the fix, a dirty release that destroys the connection
        // never woke the queued waiter, so this would hang forever.
        let conn = tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("queued waiter should be woken by the dirty release, not left hanging")
            .unwrap()
            .unwrap();
        assert_ne!(conn.get().id, first_id);
        assert_eq!(pool.live_count(), 1);
    }

    #[tokio::test]
    async fn close_fails_pending_waiters() {
        let (factory, _) = counting_factory();
        let pool = Pool::new(PoolConfig::with_size(1), factory);
        let held = pool.acquire().await.unwrap();

        let pool_clone = pool.clone();
        let waiter = tokio::spawn(async move { pool_clone.acquire().await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        pool.close();
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(PoolError::Closed)));
        drop(held);
    }
}

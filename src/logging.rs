//! Query logging sink (spec §6: `logger` attach option).
//!
//! The core emits exactly one log event per executed query, carrying the
//! rewritten SQL and bound parameters. Ambient addition grounded in the
//! corpus's `tracing` usage (the `aoide` workspace lists `tracing` as a
//! commonly-used dependency, and its `websrv` crate wires
//! `tracing-subscriber`): rather than `eprintln!` (used only for the
//! teacher's worker-reader-task fallback, not as a real logging story),
//! every executed query goes through a `QueryLogger` trait so embedders can
//! redirect it to their own sink.

use std::fmt;
use std::sync::Arc;

use crate::codec::Value;

/// A single executed-query event (spec §6: "events carry rewritten SQL and
/// bound parameters").
#[derive(Debug, Clone)]
pub struct QueryEvent<'a> {
    /// The SQL actually sent to the engine (post-translation).
    pub sql: &'a str,
    /// The parameters bound to that SQL, in position order.
    pub params: &'a [Value],
    /// Wall-clock duration of the engine call, if the event is emitted
    /// after execution (it is not emitted at all on engine error — the
    /// error path carries its own diagnostics via `DuckPgError::Engine`).
    pub duration: Option<std::time::Duration>,
}

/// Sink for query events.
///
/// Implement this to redirect query logging to a custom destination.
/// [`TracingLogger`] is the default used when no `logger` option is set.
pub trait QueryLogger: fmt::Debug + Send + Sync {
    fn on_query(&self, event: &QueryEvent<'_>);
}

/// Default logger: emits one `tracing` event per query at `DEBUG` level.
#[derive(Debug, Default)]
pub struct TracingLogger;

impl QueryLogger for TracingLogger {
    fn on_query(&self, event: &QueryEvent<'_>) {
        tracing::debug!(
            sql = event.sql,
            params = ?event.params,
            duration_us = event.duration.map(|d| d.as_micros()),
            "executed query"
        );
    }
}

/// A logger that discards every event. Useful for benchmarks and tests that
/// don't want logging overhead or output noise.
#[derive(Debug, Default)]
pub struct NullLogger;

impl QueryLogger for NullLogger {
    fn on_query(&self, _event: &QueryEvent<'_>) {}
}

/// Shared handle stored on the driver/session.
pub type SharedLogger = Arc<dyn QueryLogger>;

/// Resolve the default logger used when no `logger` option is configured.
pub fn default_logger() -> SharedLogger {
    Arc::new(TracingLogger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingLogger {
        events: Mutex<Vec<String>>,
    }

    impl QueryLogger for RecordingLogger {
        fn on_query(&self, event: &QueryEvent<'_>) {
            self.events.lock().unwrap().push(event.sql.to_string());
        }
    }

    #[test]
    fn recording_logger_captures_sql() {
        let logger = RecordingLogger::default();
        logger.on_query(&QueryEvent {
            sql: "SELECT 1",
            params: &[],
            duration: None,
        });
        assert_eq!(logger.events.lock().unwrap().as_slice(), ["SELECT 1"]);
    }

    #[test]
    fn null_logger_does_not_panic() {
        NullLogger.on_query(&QueryEvent {
            sql: "SELECT 1",
            params: &[],
            duration: None,
        });
    }
}

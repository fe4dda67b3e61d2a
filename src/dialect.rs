//! Dialect state (spec §3 "Dialect state", §4.4, §9): the per-instance
//! savepoint-capability cache and the per-query "disallowed column
//! detected" scratch flag.
//!
//! One instance lives per [`crate::Driver`] and is shared (via `Arc`)
//! across every [`crate::session::Session`] it hands out, so that two
//! drivers attached to engines of different capability (e.g. a local file
//! vs. a hosted MotherDuck endpoint) never cross-contaminate each other's
//! savepoint support (spec §9 design note). Both fields are guarded by the
//! same mutex: the per-query flag must be reset under the same
//! mutual-exclusion scope that prepares the query (spec §5).

use std::sync::Mutex;

/// Whether this driver instance's engine supports `SAVEPOINT` inside an
/// already-open transaction (spec §4.4, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavepointSupport {
    Unknown,
    Yes,
    No,
}

struct Inner {
    savepoint_support: SavepointSupport,
    disallowed_column_detected: bool,
}

/// Per-driver dialect state (spec §3 "Dialect state").
pub struct DialectState {
    inner: Mutex<Inner>,
}

impl Default for DialectState {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                savepoint_support: SavepointSupport::Unknown,
                disallowed_column_detected: false,
            }),
        }
    }

    /// Reset the per-query flag (spec §3: "reset to false at the start of
    /// every statement preparation").
    pub fn begin_prepare(&self) {
        self.inner.lock().expect("dialect state poisoned").disallowed_column_detected = false;
    }

    /// Mark that a disallowed PostgreSQL JSON/JSONB column was bound
    /// during the statement preparation currently in progress.
    pub fn mark_disallowed_column(&self) {
        self.inner.lock().expect("dialect state poisoned").disallowed_column_detected = true;
    }

    /// Check the flag at the end of preparation (spec §3: "...and
    /// inspected at the end").
    pub fn disallowed_column_detected(&self) -> bool {
        self.inner.lock().expect("dialect state poisoned").disallowed_column_detected
    }

    pub fn savepoint_support(&self) -> SavepointSupport {
        self.inner.lock().expect("dialect state poisoned").savepoint_support
    }

    pub fn set_savepoint_support(&self, support: SavepointSupport) {
        self.inner.lock().expect("dialect state poisoned").savepoint_support = support;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_resets_between_prepares() {
        let state = DialectState::new();
        state.mark_disallowed_column();
        assert!(state.disallowed_column_detected());
        state.begin_prepare();
        assert!(!state.disallowed_column_detected());
    }

    #[test]
    fn savepoint_support_defaults_unknown_and_is_settable() {
        let state = DialectState::new();
        assert_eq!(state.savepoint_support(), SavepointSupport::Unknown);
        state.set_savepoint_support(SavepointSupport::No);
        assert_eq!(state.savepoint_support(), SavepointSupport::No);
    }
}

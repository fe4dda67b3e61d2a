//! Connection pool configuration (spec §4.2, §6).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Named pool presets (spec §6: `pool` may be "a named preset").
const PRESET_STANDARD_SIZE: u32 = 6;

/// Connection pool configuration.
///
/// Constructed either directly, from an integer size, or from a named
/// preset (currently only `"standard"`, matching spec §6's `pool` table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Fixed pool capacity (`size` in spec §4.2). Must be at least 1.
    pub size: u32,
    /// How long `acquire()` waits for a free connection before failing with
    /// `PoolTimeoutError`. `None` waits indefinitely.
    pub acquire_timeout_ms: Option<u64>,
    /// Maximum age of a connection since creation before it is recycled.
    pub max_lifetime_ms: Option<u64>,
    /// How long a connection may sit idle before eviction.
    pub idle_timeout_ms: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: PRESET_STANDARD_SIZE,
            acquire_timeout_ms: None,
            max_lifetime_ms: None,
            idle_timeout_ms: None,
        }
    }
}

impl PoolConfig {
    /// Build a config with just a fixed size and no timeouts.
    pub fn with_size(size: u32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Resolve the `"standard"` preset (size 6), per spec §6.
    pub fn standard() -> Self {
        Self::with_size(PRESET_STANDARD_SIZE)
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_ms.map(Duration::from_millis)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_preset_is_size_six() {
        assert_eq!(PoolConfig::standard().size, 6);
    }

    #[test]
    fn default_has_no_timeouts() {
        let cfg = PoolConfig::default();
        assert!(cfg.acquire_timeout().is_none());
        assert!(cfg.max_lifetime().is_none());
        assert!(cfg.idle_timeout().is_none());
    }
}

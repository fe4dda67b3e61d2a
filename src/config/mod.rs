//! Attach-spec configuration (spec §6).
//!
//! Mirrors the teacher's `config::settings` split: a `Raw*` struct that is
//! `Deserialize`/`Serialize` for loading from TOML/JSON/env, plus a resolved
//! in-memory type (`Options`) that callers build the driver from. Durations
//! are accepted as milliseconds to match spec §6's `*_ms` option names
//! directly, rather than the teacher's `"5m"`-style human string (no
//! ambiguity to parse, and it matches the literal option names the spec
//! gives).

mod options;
mod pool_config;

pub use options::{ConfigError, Options, PoolOption, PrepareCacheOption, RewriteArraysMode};
pub use pool_config::PoolConfig;

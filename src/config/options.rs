//! Resolved attach options (spec §6) and the raw, `Deserialize`-friendly
//! shape they're built from.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{default_logger, SharedLogger};

use super::PoolConfig;

/// Errors raised while resolving attach options. Fatal to driver creation
/// (spec §7: `ConfigError`).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`path` is required (\":memory:\", a file path, or \"md:...\")")]
    MissingPath,

    #[error("unknown pool preset: {0}")]
    UnknownPoolPreset(String),

    #[error("pool size must be at least 1")]
    ZeroPoolSize,

    #[error("`options.motherduck_token` was set but `path` does not start with \"md:\"")]
    TokenWithoutHostedPath,

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// How the `rewrite_arrays` option gates stage 1 of the translation
/// pipeline (spec §4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteArraysMode {
    /// Only rewrite when the cheap prefilter matches (the normal case).
    #[default]
    Auto,
    /// Always run the rewrite pipeline, bypassing the prefilter.
    Always,
    /// Never rewrite array operators, even if the prefilter matches.
    Never,
}

/// Prepared-statement cache sizing (spec §4.3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareCacheOption {
    Disabled,
    Enabled { size: usize },
}

impl Default for PrepareCacheOption {
    fn default() -> Self {
        PrepareCacheOption::Enabled { size: 32 }
    }
}

/// The raw `pool` attach value: an integer size, a named preset, or a full
/// config object (spec §6).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PoolOption {
    Size(u32),
    Preset(String),
    Full(PoolConfig),
}

impl PoolOption {
    fn resolve(&self) -> Result<PoolConfig, ConfigError> {
        let cfg = match self {
            PoolOption::Size(size) => PoolConfig::with_size(*size),
            PoolOption::Preset(name) => match name.as_str() {
                "standard" => PoolConfig::standard(),
                other => return Err(ConfigError::UnknownPoolPreset(other.to_string())),
            },
            PoolOption::Full(cfg) => *cfg,
        };
        if cfg.size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        Ok(cfg)
    }
}

/// Raw `prepare_cache` value: boolean, integer size, or `{ size }` object.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
enum RawPrepareCache {
    Bool(bool),
    Size(usize),
    Object { size: usize },
}

/// Raw, serde-friendly mirror of the attach spec in spec §6. Intended to be
/// loaded from TOML/JSON by embedders, then resolved into [`Options`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawOptions {
    pub path: Option<String>,
    #[serde(default)]
    pub options: RawMotherDuckOptions,
    pub pool: Option<PoolOption>,
    #[serde(default)]
    pub rewrite_arrays: RewriteArraysMode,
    pub prepare_cache: Option<RawPrepareCache>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawMotherDuckOptions {
    pub motherduck_token: Option<String>,
}

/// Resolved, ready-to-use attach options.
///
/// The `logger` field is not `Deserialize` (it is a trait object); build it
/// with [`Options::from_raw`] and then [`Options::with_logger`].
#[derive(Clone)]
pub struct Options {
    pub path: String,
    pub motherduck_token: Option<String>,
    pub pool: PoolConfig,
    pub rewrite_arrays: RewriteArraysMode,
    pub prepare_cache: PrepareCacheOption,
    pub logger: SharedLogger,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("path", &self.path)
            .field("motherduck_token", &self.motherduck_token.as_ref().map(|_| "<redacted>"))
            .field("pool", &self.pool)
            .field("rewrite_arrays", &self.rewrite_arrays)
            .field("prepare_cache", &self.prepare_cache)
            .finish()
    }
}

impl Options {
    /// Build options from the raw, serde-friendly shape.
    pub fn from_raw(raw: RawOptions) -> Result<Self, ConfigError> {
        let path = raw.path.ok_or(ConfigError::MissingPath)?;
        let is_hosted = path.starts_with("md:");

        if raw.options.motherduck_token.is_some() && !is_hosted {
            return Err(ConfigError::TokenWithoutHostedPath);
        }

        let pool = match &raw.pool {
            Some(opt) => opt.resolve()?,
            None => PoolConfig::default(),
        };

        let prepare_cache = match raw.prepare_cache {
            None => PrepareCacheOption::default(),
            Some(RawPrepareCache::Bool(false)) => PrepareCacheOption::Disabled,
            Some(RawPrepareCache::Bool(true)) => PrepareCacheOption::default(),
            Some(RawPrepareCache::Size(0)) => PrepareCacheOption::Disabled,
            Some(RawPrepareCache::Size(size)) => PrepareCacheOption::Enabled { size },
            Some(RawPrepareCache::Object { size: 0 }) => PrepareCacheOption::Disabled,
            Some(RawPrepareCache::Object { size }) => PrepareCacheOption::Enabled { size },
        };

        Ok(Self {
            path,
            motherduck_token: raw.options.motherduck_token,
            pool,
            rewrite_arrays: raw.rewrite_arrays,
            prepare_cache,
            logger: default_logger(),
        })
    }

    /// Construct directly for the common case (no TOML/JSON round-trip).
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            motherduck_token: None,
            pool: PoolConfig::default(),
            rewrite_arrays: RewriteArraysMode::default(),
            prepare_cache: PrepareCacheOption::default(),
            logger: default_logger(),
        }
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_rewrite_arrays(mut self, mode: RewriteArraysMode) -> Self {
        self.rewrite_arrays = mode;
        self
    }

    /// Parse attach options from a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawOptions = toml::from_str(text)?;
        Self::from_raw(raw)
    }

    pub fn is_memory(&self) -> bool {
        self.path.is_empty() || self.path == ":memory:"
    }

    pub fn is_hosted(&self) -> bool {
        self.path.starts_with("md:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_an_error() {
        let raw = RawOptions {
            path: None,
            options: RawMotherDuckOptions::default(),
            pool: None,
            rewrite_arrays: RewriteArraysMode::Auto,
            prepare_cache: None,
        };
        assert!(matches!(
            Options::from_raw(raw),
            Err(ConfigError::MissingPath)
        ));
    }

    #[test]
    fn token_requires_hosted_path() {
        let raw = RawOptions {
            path: Some("./local.db".into()),
            options: RawMotherDuckOptions {
                motherduck_token: Some("secret".into()),
            },
            pool: None,
            rewrite_arrays: RewriteArraysMode::Auto,
            prepare_cache: None,
        };
        assert!(matches!(
            Options::from_raw(raw),
            Err(ConfigError::TokenWithoutHostedPath)
        ));
    }

    #[test]
    fn pool_preset_standard_resolves_to_size_six() {
        let raw = RawOptions {
            path: Some(":memory:".into()),
            options: RawMotherDuckOptions::default(),
            pool: Some(PoolOption::Preset("standard".into())),
            rewrite_arrays: RewriteArraysMode::Auto,
            prepare_cache: None,
        };
        let opts = Options::from_raw(raw).unwrap();
        assert_eq!(opts.pool.size, 6);
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let raw = RawOptions {
            path: Some(":memory:".into()),
            options: RawMotherDuckOptions::default(),
            pool: Some(PoolOption::Preset("turbo".into())),
            rewrite_arrays: RewriteArraysMode::Auto,
            prepare_cache: None,
        };
        assert!(matches!(
            Options::from_raw(raw),
            Err(ConfigError::UnknownPoolPreset(_))
        ));
    }

    #[test]
    fn prepare_cache_zero_disables() {
        let raw = RawOptions {
            path: Some(":memory:".into()),
            options: RawMotherDuckOptions::default(),
            pool: None,
            rewrite_arrays: RewriteArraysMode::Auto,
            prepare_cache: Some(RawPrepareCache::Size(0)),
        };
        let opts = Options::from_raw(raw).unwrap();
        assert_eq!(opts.prepare_cache, PrepareCacheOption::Disabled);
    }

    #[test]
    fn from_toml_parses_full_document() {
        let doc = r#"
            path = "md:my_db"

            [options]
            motherduck_token = "tok"

            [pool]
            size = 4
            acquire_timeout_ms = 1000
        "#;
        let opts = Options::from_toml(doc).unwrap();
        assert_eq!(opts.path, "md:my_db");
        assert_eq!(opts.motherduck_token.as_deref(), Some("tok"));
        assert_eq!(opts.pool.size, 4);
        assert!(opts.is_hosted());
    }

    #[test]
    fn memory_path_detection() {
        assert!(Options::new(":memory:").is_memory());
        assert!(Options::new("").is_memory());
        assert!(!Options::new("./file.duckdb").is_memory());
    }
}

//! # Core Configuration Module
//!
//! Runtime settings for the reconciliation job.
//!
//! ## Overview
//!
//! `CoreConfig` is read from a JSON file (every field optional) or assembled
//! with [`CoreConfig::builder`]. Both paths end in [`CoreConfig::validate`], so
//! a bad value fails at startup rather than halfway through a run.
//!
//! ## File lookup
//!
//! 1. An explicit path (`--config`)
//! 2. The `KPTV_CONFIG` environment variable
//! 3. `kptv-sync.json` in the working directory, if present
//!
//! An explicit or environment path that does not exist is an error; a missing
//! default file just means "use defaults".
//!
//! ## Example file
//!
//! ```json
//! {
//!   "database": { "url": "sqlite:/var/lib/kptv/kptv.db", "max_connections": 10 },
//!   "sync": { "max_concurrency": 4, "match_key": "name" },
//!   "logging": { "format": "json", "level": "info" }
//! }
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_url("sqlite::memory:")
//!     .max_concurrency(2)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::{LogFormat, LoggingConfig};

use bridge_traits::time::LogLevel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "KPTV_CONFIG";

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "kptv-sync.json";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub database: DatabaseSettings,
    pub sync: SyncSettings,
    pub logging: LoggingSettings,
}

/// Connection pool settings for the stream catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// sqlx connection URL, e.g. `sqlite:kptv.db`
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite:kptv.db".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

impl DatabaseSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Which record field groups duplicates during fixup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKeySetting {
    /// Normalized display name
    #[default]
    Name,
    /// Normalized channel number
    Channel,
    /// Name when present, channel otherwise
    NameOrChannel,
}

/// Reconciliation run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Units (providers or users) processed at the same time
    pub max_concurrency: usize,
    /// Upper bound on a single provider feed fetch
    pub feed_timeout_secs: u64,
    /// Upper bound on a single store call
    pub store_timeout_secs: u64,
    /// HTTP attempts per feed fetch, including the first
    pub http_retry_attempts: u32,
    pub match_key: MatchKeySetting,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            feed_timeout_secs: 60,
            store_timeout_secs: 120,
            http_retry_attempts: 3,
            match_key: MatchKeySetting::default(),
        }
    }
}

impl SyncSettings {
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Raw `EnvFilter` directives, replacing the level-based default
    pub filter: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
        }
    }
}

impl LoggingSettings {
    /// Convert to the logging subsystem's configuration.
    pub fn to_logging_config(&self) -> LoggingConfig {
        let config = LoggingConfig::default()
            .with_format(self.format)
            .with_level(self.level);
        match &self.filter {
            Some(filter) => config.with_filter(filter.clone()),
            None => config,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: CoreConfig = serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigFile`] if the file cannot be read or parsed, and
    /// [`Error::Config`] if a value fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let config: CoreConfig = serde_json::from_str(&raw).map_err(|e| Error::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration following the lookup order described in the module
    /// docs.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        match resolve_path(explicit, env_path) {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database URL is not empty
    /// - Pool size, concurrency, timeouts and retry attempts are non-zero
    /// - A custom log filter is not blank
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(Error::Config("Database URL cannot be empty".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if self.database.acquire_timeout_secs == 0 {
            return Err(Error::Config(
                "database.acquire_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.sync.max_concurrency == 0 {
            return Err(Error::Config(
                "sync.max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.sync.feed_timeout_secs == 0 || self.sync.store_timeout_secs == 0 {
            return Err(Error::Config(
                "sync timeouts must be greater than 0 seconds".to_string(),
            ));
        }

        if self.sync.http_retry_attempts == 0 {
            return Err(Error::Config(
                "sync.http_retry_attempts must be at least 1".to_string(),
            ));
        }

        if matches!(&self.logging.filter, Some(filter) if filter.trim().is_empty()) {
            return Err(Error::Config(
                "logging.filter cannot be blank; omit it instead".to_string(),
            ));
        }

        Ok(())
    }
}

/// Pick the configuration file: explicit path first, then the environment.
pub fn resolve_path(explicit: Option<&Path>, env_path: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env_path.filter(|p| !p.as_os_str().is_empty()))
}

/// Builder for `CoreConfig`
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// Sets the catalog connection URL.
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database.url = url.into();
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.config.database.max_connections = max;
        self
    }

    /// Sets how many units run at once.
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.sync.max_concurrency = max;
        self
    }

    pub fn feed_timeout(mut self, timeout: Duration) -> Self {
        self.config.sync.feed_timeout_secs = timeout.as_secs();
        self
    }

    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.config.sync.store_timeout_secs = timeout.as_secs();
        self
    }

    pub fn http_retry_attempts(mut self, attempts: u32) -> Self {
        self.config.sync.http_retry_attempts = attempts;
        self
    }

    pub fn match_key(mut self, key: MatchKeySetting) -> Self {
        self.config.sync.match_key = key;
        self
    }

    pub fn logging(mut self, logging: LoggingSettings) -> Self {
        self.config.logging = logging;
        self
    }

    /// Builds and validates the final `CoreConfig`.
    pub fn build(self) -> Result<CoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

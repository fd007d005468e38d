//! TOML configuration.
//!
//! Every section and field has a default, so an empty file is a valid
//! in-memory configuration. The secret API key is best supplied through
//! `ALPHAVANTAGE_API_KEY`, which overrides `provider.api_key`.

use insights_core::DataError;
use insights_manager::{CacheTtls, DEFAULT_MAX_CONCURRENCY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::logging::LogFormat;

/// Environment variable holding the Alpha Vantage API key.
pub const API_KEY_ENV: &str = "ALPHAVANTAGE_API_KEY";

/// Errors loading configuration or building components from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`InsightsConfig`].
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field has an unusable value.
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The provider client could not be built.
    #[error("Failed to build provider client: {0}")]
    Provider(#[source] DataError),

    /// A configured backend could not be opened.
    #[error("Failed to open backend: {0}")]
    Backend(#[from] DataError),

    /// The tracing subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InsightsConfig {
    /// Upstream provider.
    pub provider: ProviderConfig,
    /// Market-data cache.
    pub cache: CacheConfig,
    /// Prefetch behavior.
    pub prefetch: PrefetchConfig,
    /// Snapshot document storage.
    pub storage: StorageConfig,
    /// Logging output.
    pub logging: LoggingConfig,
}

impl InsightsConfig {
    /// Load from a TOML file, apply environment overrides and validate.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or fails
    /// [`validate`](Self::validate).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        let config = config.with_api_key_override(std::env::var(API_KEY_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate TOML without consulting the environment.
    ///
    /// # Errors
    /// Returns an error if `contents` cannot be parsed or fails validation.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the API key when `api_key` is a non-empty value.
    #[must_use]
    pub fn with_api_key_override(mut self, api_key: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.provider.api_key = Some(key);
        }
        self
    }

    /// Check values that would only fail later, at wiring or run time.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "provider.timeout_secs",
                reason: "must be > 0".to_string(),
            });
        }
        if self
            .provider
            .base_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "provider.base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cache.backend == CacheBackendKind::Sqlite && self.cache.path.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "cache.path",
                reason: "required for the sqlite backend".to_string(),
            });
        }
        if self.prefetch.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "prefetch.max_concurrency",
                reason: "must be > 0".to_string(),
            });
        }
        if self.prefetch.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "prefetch.timeout_secs",
                reason: "must be > 0".to_string(),
            });
        }
        if self.storage.backend == StorageBackendKind::Sqlite && self.storage.path.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "storage.path",
                reason: "required for the sqlite backend".to_string(),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// `[provider]` section.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Alpha Vantage API key.
    pub api_key: Option<String>,
    /// Override of the query endpoint.
    pub base_url: Option<String>,
    /// Minimum spacing between requests.
    pub request_spacing_ms: u64,
    /// HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            request_spacing_ms: 1000,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("request_spacing_ms", &self.request_spacing_ms)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    /// Request spacing as a duration.
    #[must_use]
    pub const fn request_spacing(&self) -> Duration {
        Duration::from_millis(self.request_spacing_ms)
    }

    /// HTTP timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Market-data cache backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Process-local map.
    #[default]
    Memory,
    /// SQLite file at `cache.path`.
    Sqlite,
    /// Caching disabled.
    None,
}

/// `[cache]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Backend to use.
    pub backend: CacheBackendKind,
    /// Database file for the sqlite backend.
    pub path: Option<PathBuf>,
    /// `[cache.ttl]`: lifetimes for domains without a granularity.
    pub ttl: CacheTtls,
}

/// `[prefetch]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrefetchConfig {
    /// Cap on simultaneous provider calls.
    pub max_concurrency: usize,
    /// Bound on the prefetch phase of a snapshot run.
    pub timeout_secs: u64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout_secs: 60,
        }
    }
}

impl PrefetchConfig {
    /// Prefetch timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Snapshot storage backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Process-local store.
    #[default]
    Memory,
    /// SQLite file at `storage.path`.
    Sqlite,
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend to use.
    pub backend: StorageBackendKind,
    /// Database file for the sqlite backend.
    pub path: Option<PathBuf>,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Install the global subscriber described by this section.
    ///
    /// # Errors
    /// See [`init_logging`](crate::logging::init_logging).
    pub fn init(&self) -> Result<(), ConfigError> {
        crate::logging::init_logging(self.format, &self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_valid_defaults() {
        let config = InsightsConfig::from_toml("").unwrap();
        assert_eq!(config, InsightsConfig::default());
        assert_eq!(config.cache.backend, CacheBackendKind::Memory);
        assert_eq!(config.prefetch.max_concurrency, 8);
        assert_eq!(config.cache.ttl.news, 900);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_full_config() {
        let config = InsightsConfig::from_toml(
            r#"
            [provider]
            api_key = "file-key"
            request_spacing_ms = 250

            [cache]
            backend = "sqlite"
            path = "/tmp/insights-cache.db"

            [cache.ttl]
            news = 60
            treasury = 0

            [prefetch]
            max_concurrency = 3
            timeout_secs = 10

            [storage]
            backend = "sqlite"
            path = "/tmp/insights.db"

            [logging]
            format = "json"
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.provider.request_spacing(), Duration::from_millis(250));
        assert_eq!(config.provider.timeout_secs, 30);
        assert_eq!(config.cache.ttl.news, 60);
        assert_eq!(config.cache.ttl.treasury, 0);
        assert_eq!(config.cache.ttl.ipo_calendar, 86400);
        assert_eq!(config.prefetch.timeout(), Duration::from_secs(10));
        assert_eq!(config.storage.backend, StorageBackendKind::Sqlite);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validation_failures() {
        let err = InsightsConfig::from_toml("[prefetch]\nmax_concurrency = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "prefetch.max_concurrency",
                ..
            }
        ));

        let err = InsightsConfig::from_toml("[storage]\nbackend = \"sqlite\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "storage.path", .. }));

        let err = InsightsConfig::from_toml("[provider]\ntimeout_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = InsightsConfig::from_toml("[cache]\nbackend = \"redis\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = InsightsConfig::from_toml("[prefetch]\nworkers = 4").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_api_key_override_and_redaction() {
        let config = InsightsConfig::from_toml("[provider]\napi_key = \"file-key\"").unwrap();

        let kept = config.clone().with_api_key_override(Some("  ".to_string()));
        assert_eq!(kept.provider.api_key.as_deref(), Some("file-key"));

        let overridden = config.with_api_key_override(Some("env-key".to_string()));
        assert_eq!(overridden.provider.api_key.as_deref(), Some("env-key"));
        assert!(!format!("{overridden:?}").contains("env-key"));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = InsightsConfig::from_path("/nonexistent/insights.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

//! Wiring of configured components.

use insights_alphavantage::AlphaVantageProvider;
use insights_cache::{CacheBackend, CacheStore, InMemoryBackend, NoopBackend};
use insights_core::MarketDataProvider;
use insights_manager::DataManager;
use insights_snapshot::{CategoryRegistry, DocumentStore, InMemoryDocumentStore, SnapshotPipeline};
use std::sync::Arc;
use tracing::info;

use crate::config::{
    CacheBackendKind, ConfigError, InsightsConfig, StorageBackendKind,
};

/// A data manager and document store built from an [`InsightsConfig`].
///
/// # Example
///
/// ```rust,ignore
/// use insights::{CategoryRegistry, Insights, InsightsConfig};
///
/// let config = InsightsConfig::from_path("insights.toml")?;
/// config.logging.init()?;
///
/// let insights = Insights::from_config(config)?;
/// let pipeline = insights.pipeline(CategoryRegistry::new().with(my_calculator));
/// for (category, outcome) in pipeline.run_all().await {
///     println!("{category}: {:?}", outcome.map(|run| run.status));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Insights {
    config: InsightsConfig,
    manager: DataManager,
    store: Arc<dyn DocumentStore>,
}

impl Insights {
    /// Build everything from `config`, talking to Alpha Vantage.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if no API key is configured,
    /// [`ConfigError::Provider`] if the HTTP client cannot be built, and
    /// [`ConfigError::Backend`] if a backend cannot be opened.
    pub fn from_config(config: InsightsConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .provider
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "provider.api_key",
                reason: format!("not set; put it in the config or {}", crate::API_KEY_ENV),
            })?;

        let mut provider = AlphaVantageProvider::with_timeout(api_key, config.provider.timeout())
            .map_err(ConfigError::Provider)?
            .with_request_spacing(config.provider.request_spacing());
        if let Some(base_url) = &config.provider.base_url {
            provider = provider.with_base_url(base_url.clone());
        }
        Self::with_provider(config, Arc::new(provider))
    }

    /// Build everything from `config` around an existing provider.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the configuration is invalid or a backend
    /// cannot be opened.
    pub fn with_provider(
        config: InsightsConfig,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let cache = CacheStore::new(cache_backend(&config)?);
        let manager = DataManager::new(provider, cache)
            .with_ttls(config.cache.ttl)
            .with_max_concurrency(config.prefetch.max_concurrency);
        let store = document_store(&config)?;

        info!(
            provider = manager.provider().name(),
            cache = ?config.cache.backend,
            storage = ?config.storage.backend,
            max_concurrency = manager.max_concurrency(),
            "Insights initialized"
        );

        Ok(Self {
            config,
            manager,
            store,
        })
    }

    /// The configuration this was built from.
    #[must_use]
    pub const fn config(&self) -> &InsightsConfig {
        &self.config
    }

    /// The data manager.
    #[must_use]
    pub const fn manager(&self) -> &DataManager {
        &self.manager
    }

    /// The snapshot document store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    /// A snapshot pipeline over `registry`.
    #[must_use]
    pub fn pipeline(&self, registry: CategoryRegistry) -> SnapshotPipeline {
        SnapshotPipeline::new(self.manager.clone(), Arc::new(registry), self.store())
            .with_prefetch_timeout(self.config.prefetch.timeout())
    }
}

fn cache_backend(config: &InsightsConfig) -> Result<Arc<dyn CacheBackend>, ConfigError> {
    Ok(match config.cache.backend {
        CacheBackendKind::Memory => Arc::new(InMemoryBackend::new()),
        CacheBackendKind::None => Arc::new(NoopBackend::new()),
        #[cfg(feature = "sqlite")]
        CacheBackendKind::Sqlite => {
            let path = config.cache.path.as_ref().ok_or(ConfigError::InvalidValue {
                field: "cache.path",
                reason: "required for the sqlite backend".to_string(),
            })?;
            Arc::new(insights_cache::SqliteBackend::new(path)?)
        }
        #[cfg(not(feature = "sqlite"))]
        CacheBackendKind::Sqlite => return Err(sqlite_disabled("cache.backend")),
    })
}

fn document_store(config: &InsightsConfig) -> Result<Arc<dyn DocumentStore>, ConfigError> {
    Ok(match config.storage.backend {
        StorageBackendKind::Memory => Arc::new(InMemoryDocumentStore::new()),
        #[cfg(feature = "sqlite")]
        StorageBackendKind::Sqlite => {
            let path = config.storage.path.as_ref().ok_or(ConfigError::InvalidValue {
                field: "storage.path",
                reason: "required for the sqlite backend".to_string(),
            })?;
            Arc::new(insights_snapshot::SqliteDocumentStore::new(path)?)
        }
        #[cfg(not(feature = "sqlite"))]
        StorageBackendKind::Sqlite => return Err(sqlite_disabled("storage.backend")),
    })
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_disabled(field: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: "built without the `sqlite` feature".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insights_core::{Granularity, RawBar, StaticProvider};
    use insights_manager::PrefetchRequest;

    fn provider() -> Arc<StaticProvider> {
        Arc::new(StaticProvider::new().with_bars(
            "AAPL",
            Granularity::Daily,
            vec![RawBar {
                date: "2024-01-02".to_string(),
                open: "185.0".to_string(),
                high: "186.0".to_string(),
                low: "184.0".to_string(),
                close: "185.5".to_string(),
                volume: "1000".to_string(),
            }],
        ))
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let err = Insights::from_config(InsightsConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "provider.api_key",
                ..
            }
        ));
    }

    #[test]
    fn test_from_config_with_key() {
        let config = InsightsConfig::default().with_api_key_override(Some("k".to_string()));
        let insights = Insights::from_config(config).unwrap();
        assert_eq!(insights.manager().provider().name(), "Alpha Vantage");
    }

    #[test]
    fn test_client_failure_is_a_provider_error() {
        let err = ConfigError::Provider(insights_core::DataError::Network(
            "no TLS backend".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "Failed to build provider client: Network error: no TLS backend"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[cfg(not(feature = "sqlite"))]
    #[test]
    fn test_sqlite_backend_requires_feature() {
        let config =
            InsightsConfig::from_toml("[cache]\nbackend = \"sqlite\"\npath = \"c.db\"").unwrap();
        let err = Insights::with_provider(config, provider()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "cache.backend",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_wiring_applies_config() {
        let config = InsightsConfig::from_toml(
            "[prefetch]\nmax_concurrency = 2\n[cache]\nbackend = \"none\"",
        )
        .unwrap();
        let provider = provider();
        let insights = Insights::with_provider(config, provider.clone()).unwrap();
        assert_eq!(insights.manager().max_concurrency(), 2);

        let request = PrefetchRequest::new().symbols(["aapl"]);
        insights.manager().prefetch_shared(&request).await;
        insights.manager().prefetch_shared(&request).await;

        // Caching disabled: both prefetches reach the provider.
        assert_eq!(provider.call_count("market:daily:AAPL").await, 2);
        assert!(insights.pipeline(CategoryRegistry::new()).registry().is_empty());
    }
}

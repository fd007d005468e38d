//! Cache-aside data manager and concurrent prefetch.

use futures::{FutureExt, StreamExt, stream};
use insights_cache::CacheStore;
use insights_core::{
    ALL_TOPICS, CacheKeys, DataError, Granularity, IndicatorPoint, IpoListing, MarketDataProvider,
    NewsArticle, OhlcvBar, Result, Symbol, TreasuryPoint,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::{
    context::{FetchedData, SharedDataContext},
    normalize::{normalize_bars, normalize_indicator, normalize_treasury},
    request::{PrefetchItem, PrefetchRequest},
};

/// Default cap on simultaneous provider calls during a prefetch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Cache lifetimes, in seconds, for the domains without a granularity.
///
/// A value of zero or less disables caching for that domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    /// Treasury yield series.
    pub treasury: i64,
    /// Economic indicator series.
    pub indicator: i64,
    /// News sentiment feed.
    pub news: i64,
    /// IPO calendar.
    pub ipo_calendar: i64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            treasury: 3600,
            indicator: 86400,
            news: 900,
            ipo_calendar: 86400,
        }
    }
}

/// Cache-aside front of a [`MarketDataProvider`].
///
/// Every getter builds a key with [`CacheKeys`], answers from the cache when
/// it can, and otherwise calls the provider, normalizes the payload and
/// writes it through. Price bars use the TTL of their [`Granularity`], so
/// intraday bars are always fetched fresh.
///
/// # Example
///
/// ```rust,ignore
/// use insights_manager::{DataManager, PrefetchRequest};
///
/// let manager = DataManager::new(provider, cache).with_max_concurrency(4);
///
/// let bars = manager.get_ohlcv("aapl", Granularity::Daily).await?;
///
/// let ctx = manager
///     .prefetch_shared(&PrefetchRequest::new().symbols(["NVDA", "MSFT"]).treasury(["10year"]))
///     .await;
/// if ctx.has_errors() {
///     // some items are missing, the rest are usable
/// }
/// ```
#[derive(Clone)]
pub struct DataManager {
    provider: Arc<dyn MarketDataProvider>,
    cache: CacheStore,
    ttls: CacheTtls,
    max_concurrency: usize,
}

impl std::fmt::Debug for DataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataManager")
            .field("provider", &self.provider.name())
            .field("ttls", &self.ttls)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

impl DataManager {
    /// Create a manager with default TTLs and concurrency.
    #[must_use]
    pub fn new(provider: Arc<dyn MarketDataProvider>, cache: CacheStore) -> Self {
        Self {
            provider,
            cache,
            ttls: CacheTtls::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Override the per-domain TTLs.
    #[must_use]
    pub const fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    /// Cap simultaneous provider calls during a prefetch (at least one).
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// The cache this manager writes through to.
    #[must_use]
    pub const fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// The upstream provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        &self.provider
    }

    /// Configured TTLs.
    #[must_use]
    pub const fn ttls(&self) -> CacheTtls {
        self.ttls
    }

    /// Configured concurrency cap.
    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Bars for `symbol` at `granularity`, ascending by date.
    ///
    /// # Errors
    /// Returns the provider's error on a cache miss that cannot be filled.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn get_ohlcv(&self, symbol: &str, granularity: Granularity) -> Result<Vec<OhlcvBar>> {
        let symbol = Symbol::new(symbol);
        let key = CacheKeys::market(granularity, symbol.as_str());
        if granularity.is_intraday() {
            debug!(key = %key, "Intraday bars are never cached");
        }
        let fetch = async {
            let raw = self.provider.fetch_bars(&symbol, granularity).await?;
            Ok(normalize_bars(raw))
        };
        self.cache_aside(&key, granularity.ttl_seconds(), fetch).await
    }

    /// Treasury yields for `maturity`, ascending by date.
    ///
    /// # Errors
    /// Returns the provider's error on a cache miss that cannot be filled.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn get_treasury(&self, maturity: &str) -> Result<Vec<TreasuryPoint>> {
        let key = CacheKeys::treasury(maturity);
        let fetch = async {
            let raw = self.provider.fetch_treasury_yield(maturity).await?;
            Ok(normalize_treasury(raw, maturity))
        };
        self.cache_aside(&key, self.ttls.treasury, fetch).await
    }

    /// Economic indicator series `name`, ascending by date.
    ///
    /// # Errors
    /// Returns the provider's error on a cache miss that cannot be filled.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn get_indicator(&self, name: &str) -> Result<Vec<IndicatorPoint>> {
        let key = CacheKeys::indicator(name);
        let fetch = async {
            let raw = self.provider.fetch_economic_indicator(name).await?;
            Ok(normalize_indicator(raw, name))
        };
        self.cache_aside(&key, self.ttls.indicator, fetch).await
    }

    /// News with sentiment, for one topic or all topics.
    ///
    /// # Errors
    /// Returns the provider's error on a cache miss that cannot be filled.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn get_news_sentiment(&self, topic: Option<&str>) -> Result<Vec<NewsArticle>> {
        let topic = topic.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());
        let key = CacheKeys::news_sentiment(topic.as_deref().unwrap_or(ALL_TOPICS));
        let fetch = self.provider.fetch_news_sentiment(topic.as_deref());
        self.cache_aside(&key, self.ttls.news, fetch).await
    }

    /// Upcoming IPOs.
    ///
    /// # Errors
    /// Returns the provider's error on a cache miss that cannot be filled.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn get_ipo_calendar(&self) -> Result<Vec<IpoListing>> {
        let key = CacheKeys::ipo_calendar();
        let fetch = self.provider.fetch_ipo_calendar();
        self.cache_aside(&key, self.ttls.ipo_calendar, fetch).await
    }

    /// Drop every cached entry under `domain:kind:`.
    ///
    /// Returns the number of entries removed.
    pub async fn invalidate(&self, domain: &str, kind: &str) -> usize {
        self.cache.invalidate(&CacheKeys::pattern(domain, kind)).await
    }

    /// Fetch everything `request` names into a fresh context.
    ///
    /// Never fails: items that cannot be fetched are recorded in the
    /// context's error map and the rest are still returned.
    pub async fn prefetch_shared(&self, request: &PrefetchRequest) -> SharedDataContext {
        let mut context = SharedDataContext::new();
        self.prefetch_into(request, &mut context).await;
        context
    }

    /// Fetch everything `request` names into `context`.
    ///
    /// At most `max_concurrency` items are in flight at once. Results are
    /// merged as they complete, so if this future is dropped early `context`
    /// keeps every item that had already finished.
    #[instrument(skip(self, request, context), fields(provider = self.provider.name()))]
    pub async fn prefetch_into(&self, request: &PrefetchRequest, context: &mut SharedDataContext) {
        let items = request.items();
        let total = items.len();
        debug!(total, max_concurrency = self.max_concurrency, "Starting prefetch");

        let mut outcomes = stream::iter(items)
            .map(|item| self.fetch_item(item))
            .buffer_unordered(self.max_concurrency);

        let mut failed = 0usize;
        while let Some((key, outcome)) = outcomes.next().await {
            if let Err(e) = &outcome {
                failed += 1;
                warn!(key = %key, error = %e, "Prefetch item failed");
            }
            context.record(key, outcome);
        }

        info!(total, failed, "Prefetch complete");
    }

    async fn fetch_item(&self, item: PrefetchItem) -> (String, Result<FetchedData>) {
        let key = item.key();
        let outcome = AssertUnwindSafe(self.fetch_data(item))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(DataError::Other(format!(
                    "fetch panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });
        (key, outcome)
    }

    async fn fetch_data(&self, item: PrefetchItem) -> Result<FetchedData> {
        match item {
            PrefetchItem::Ohlcv {
                symbol,
                granularity,
            } => {
                let bars = self.get_ohlcv(symbol.as_str(), granularity).await?;
                Ok(FetchedData::Ohlcv { symbol, bars })
            }
            PrefetchItem::Treasury(maturity) => {
                let points = self.get_treasury(&maturity).await?;
                Ok(FetchedData::Treasury { maturity, points })
            }
            PrefetchItem::Indicator(name) => {
                let points = self.get_indicator(&name).await?;
                Ok(FetchedData::Indicator { name, points })
            }
            PrefetchItem::News(topic) => Ok(FetchedData::News(
                self.get_news_sentiment(topic.as_deref()).await?,
            )),
            PrefetchItem::IpoCalendar => Ok(FetchedData::IpoCalendar(self.get_ipo_calendar().await?)),
        }
    }

    /// Serve `key` from cache or from `fetch`, writing through when `ttl > 0`.
    ///
    /// A TTL of zero or less skips the cache in both directions. Empty
    /// payloads are returned but not cached.
    async fn cache_aside<T, F>(&self, key: &str, ttl: i64, fetch: F) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = Result<Vec<T>>>,
    {
        if ttl <= 0 {
            return fetch.await;
        }
        if let Some(cached) = self.cache.get::<Vec<T>>(key).await {
            return Ok(cached);
        }

        let fresh = fetch.await?;
        if fresh.is_empty() {
            debug!(key, "Not caching empty payload");
        } else {
            self.cache.set(key, fresh.as_slice(), ttl).await;
        }
        Ok(fresh)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::external::price_provider::{HistoryProvider, PriceProviderError};
use crate::models::{DateRange, LiveQuote, PriceSeries};

pub const DEFAULT_HISTORY_TTL: Duration = Duration::from_secs(300);

/// History entries older than `ttl * DEFAULT_MAX_STALE_FACTOR` are evicted
/// unless configured otherwise.
pub const DEFAULT_MAX_STALE_FACTOR: u32 = 12;

/// Cache keys. History keys carry the full query so differing ranges never
/// collide; live keys are written only by the poller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    History { symbol: String, range: DateRange },
    Live { symbol: String },
}

impl CacheKey {
    pub fn history(symbol: &str, range: DateRange) -> Self {
        CacheKey::History {
            symbol: symbol.to_string(),
            range,
        }
    }

    pub fn live(symbol: &str) -> Self {
        CacheKey::Live {
            symbol: symbol.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
enum CachedValue {
    Series(Arc<PriceSeries>),
    Live(LiveQuote),
}

/// Entries are replaced wholesale on refetch, never mutated in place.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    fetched_at: DateTime<Utc>,
    fetched_instant: Instant,
}

impl CacheEntry {
    fn new(value: CachedValue) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
            fetched_instant: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_instant.elapsed() < ttl
    }

    fn is_expired(&self, max_stale: Duration) -> bool {
        matches!(self.value, CachedValue::Series(_)) && self.fetched_instant.elapsed() >= max_stale
    }
}

/// A value handed out by the cache, with when it was fetched and whether it
/// is being served past its TTL because the refresh failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
    pub stale: bool,
}

/// Time-windowed store for provider results, shared by request handlers and
/// the live poller.
///
/// Per-key state is Absent, Fresh or Stale. A read clones the entry out of
/// its shard and releases the shard lock before any provider call, so
/// network latency never holds a lock and a reader never sees a half-written
/// entry. Concurrent misses for the same key may each call the provider;
/// the last write wins.
///
/// History entries past `max_stale` are no longer served, even as a
/// fallback, and are dropped by `purge_expired`. Live entries are only ever
/// overwritten by the poller.
#[derive(Clone)]
pub struct FreshnessCache {
    entries: Arc<DashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_stale: Duration,
}

impl FreshnessCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            max_stale: ttl * DEFAULT_MAX_STALE_FACTOR,
        }
    }

    /// Set how long a history entry may be kept for stale-serve. Never
    /// shorter than the TTL.
    pub fn with_max_stale(mut self, max_stale: Duration) -> Self {
        self.max_stale = max_stale.max(self.ttl);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_stale(&self) -> Duration {
        self.max_stale
    }

    /// Return the series for `symbol` over `range`, fetching through
    /// `provider` when absent or older than the TTL.
    ///
    /// If the refetch fails and an earlier value exists, that value is
    /// returned with `stale: true` and the entry stays stale, so the next
    /// call retries the provider.
    pub async fn get_series(
        &self,
        provider: &dyn HistoryProvider,
        symbol: &str,
        range: DateRange,
    ) -> Result<Cached<Arc<PriceSeries>>, PriceProviderError> {
        let key = CacheKey::history(symbol, range);

        let mut previous = self.entries.get(&key).map(|entry| entry.value().clone());

        if previous.as_ref().is_some_and(|entry| entry.is_expired(self.max_stale)) {
            // Too old to serve even as a fallback
            self.entries
                .remove_if(&key, |_, entry| entry.is_expired(self.max_stale));
            previous = None;
        }

        if let Some(entry) = &previous {
            if let CachedValue::Series(series) = &entry.value {
                if entry.is_fresh(self.ttl) {
                    debug!("Returning cached data for {}", symbol);
                    return Ok(Cached {
                        value: series.clone(),
                        fetched_at: entry.fetched_at,
                        stale: false,
                    });
                }
            }
        }

        match provider.fetch_history(symbol, range).await {
            Ok(series) => {
                let series = Arc::new(series);
                let entry = CacheEntry::new(CachedValue::Series(series.clone()));
                let fetched_at = entry.fetched_at;
                self.entries.insert(key, entry);

                info!("Fetched {} bars for {} ({} to {})", series.len(), symbol, range.start, range.end);
                Ok(Cached {
                    value: series,
                    fetched_at,
                    stale: false,
                })
            }
            Err(e) => match previous {
                Some(CacheEntry {
                    value: CachedValue::Series(series),
                    fetched_at,
                    ..
                }) => {
                    warn!("Refresh failed for {}: {}. Serving data fetched at {}", symbol, e, fetched_at);
                    Ok(Cached {
                        value: series,
                        fetched_at,
                        stale: true,
                    })
                }
                _ => {
                    warn!("Failed to fetch data for {}: {}", symbol, e);
                    Err(e)
                }
            },
        }
    }

    /// Store the latest quote for a symbol, replacing the previous one.
    pub fn put_live(&self, quote: LiveQuote) {
        let key = CacheKey::live(&quote.symbol);
        self.entries.insert(key, CacheEntry::new(CachedValue::Live(quote)));
    }

    pub fn get_live(&self, symbol: &str) -> Option<LiveQuote> {
        let entry = self.entries.get(&CacheKey::live(symbol))?;
        match &entry.value {
            CachedValue::Live(quote) => Some(quote.clone()),
            CachedValue::Series(_) => None,
        }
    }

    /// All live quotes currently held, ordered by symbol.
    pub fn live_quotes(&self) -> Vec<LiveQuote> {
        let mut quotes: Vec<LiveQuote> = self
            .entries
            .iter()
            .filter_map(|entry| match &entry.value().value {
                CachedValue::Live(quote) => Some(quote.clone()),
                CachedValue::Series(_) => None,
            })
            .collect();
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        quotes
    }

    /// Remove history entries older than the max-stale age and return how
    /// many were dropped.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(self.max_stale));
        before.saturating_sub(self.entries.len())
    }

    /// Drop an entry so the next read goes to the provider.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FreshnessCache {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_TTL)
    }
}

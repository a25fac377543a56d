use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::external::price_provider::{LiveQuoteProvider, PriceProviderError};
use crate::models::TrackedSymbols;
use crate::services::broadcast::UpdatePublisher;
use crate::services::freshness_cache::FreshnessCache;
use crate::services::rate_limiter::RateLimiter;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of one pass over the tracked symbols.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub published: usize,
    pub failed: usize,
}

/// Background job that refreshes the live quote of every tracked symbol on
/// a fixed period, stores it in the cache and pushes it to subscribers.
///
/// A failing symbol is logged and skipped; it never aborts the cycle or the
/// loop. The job holds no cache entries between cycles.
pub struct LiveQuotePoller {
    provider: Arc<dyn LiveQuoteProvider>,
    cache: FreshnessCache,
    publisher: Arc<dyn UpdatePublisher>,
    symbols: Arc<TrackedSymbols>,
    period: Duration,
    fetch_timeout: Duration,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl LiveQuotePoller {
    pub fn new(
        provider: Arc<dyn LiveQuoteProvider>,
        cache: FreshnessCache,
        publisher: Arc<dyn UpdatePublisher>,
        symbols: Arc<TrackedSymbols>,
        period: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            publisher,
            symbols,
            period,
            fetch_timeout,
            rate_limiter: None,
        }
    }

    /// Space live fetches out. The wait for a slot happens before the fetch
    /// timeout starts, so only the provider call itself is bounded.
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(Arc::new(rate_limiter));
        self
    }

    /// Fetch every tracked symbol concurrently, publishing each quote as soon
    /// as its own fetch resolves so one slow symbol holds up nobody else.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let mut pending: FuturesUnordered<_> = self
            .symbols
            .iter()
            .map(|symbol| {
                let ticker = symbol.ticker.clone();
                let provider = self.provider.clone();
                let fetch_timeout = self.fetch_timeout;
                let rate_limiter = self.rate_limiter.clone();
                async move {
                    let _guard = match &rate_limiter {
                        Some(limiter) => Some(limiter.acquire().await),
                        None => None,
                    };
                    let result = match timeout(fetch_timeout, provider.fetch_live(&ticker)).await {
                        Ok(result) => result,
                        Err(_) => Err(PriceProviderError::Unavailable(format!(
                            "timed out after {}s",
                            fetch_timeout.as_secs_f64()
                        ))),
                    };
                    (ticker, result)
                }
            })
            .collect();

        while let Some((ticker, result)) = pending.next().await {
            match result {
                Ok(quote) => {
                    let update = quote.to_update();
                    self.cache.put_live(quote);
                    let receivers = self.publisher.publish(update.clone());
                    info!(
                        "Emitted live update for {}: {} ({} subscribers)",
                        update.symbol, update.price, receivers
                    );
                    report.published += 1;
                }
                Err(e) => {
                    error!("Error fetching live data for {}: {}", ticker, e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Run cycles forever. Each cycle runs as its own task so even a panic
    /// inside a provider only costs that cycle. Expired history entries are
    /// swept from the cache after every cycle.
    pub async fn run(self: Arc<Self>) {
        info!(
            "🚀 Live quote poller started: {} symbols every {}s",
            self.symbols.len(),
            self.period.as_secs()
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let poller = self.clone();
            match tokio::spawn(async move { poller.run_cycle().await }).await {
                Ok(report) if report.failed > 0 => warn!(
                    "Live quote cycle finished: {} published, {} failed",
                    report.published, report.failed
                ),
                Ok(report) => info!("Live quote cycle finished: {} published", report.published),
                Err(e) => error!("Live quote cycle aborted: {}", e),
            }

            let evicted = self.cache.purge_expired();
            if evicted > 0 {
                info!("Evicted {} expired history entries", evicted);
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(Arc::new(self).run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::price_provider::HistoryProvider;
    use crate::models::{DateRange, LiveQuote, PriceSeries, PriceUpdate, Symbol};
    use chrono::NaiveDate;
    use crate::services::broadcast::PriceBroadcast;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted provider: per-symbol price, failure or delay.
    #[derive(Default)]
    struct ScriptedProvider {
        prices: HashMap<String, f64>,
        delays: HashMap<String, Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn with_price(mut self, symbol: &str, price: f64) -> Self {
            self.prices.insert(symbol.to_string(), price);
            self
        }

        fn with_delay(mut self, symbol: &str, delay: Duration) -> Self {
            self.delays.insert(symbol.to_string(), delay);
            self
        }
    }

    #[async_trait]
    impl LiveQuoteProvider for ScriptedProvider {
        async fn fetch_live(&self, symbol: &str) -> Result<LiveQuote, PriceProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(symbol) {
                tokio::time::sleep(*delay).await;
            }
            match self.prices.get(symbol) {
                Some(price) => Ok(LiveQuote::new(symbol, *price)),
                None => Err(PriceProviderError::NoData(symbol.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<PriceUpdate>>,
    }

    impl UpdatePublisher for RecordingPublisher {
        fn publish(&self, update: PriceUpdate) -> usize {
            self.published.lock().push(update);
            1
        }
    }

    fn symbols(tickers: &[&str]) -> Arc<TrackedSymbols> {
        let list = tickers
            .iter()
            .map(|t| Symbol {
                ticker: t.to_string(),
                name: t.to_string(),
            })
            .collect();
        Arc::new(TrackedSymbols::new(list).unwrap())
    }

    fn poller(
        provider: Arc<ScriptedProvider>,
        cache: FreshnessCache,
        publisher: Arc<dyn UpdatePublisher>,
        tickers: &[&str],
    ) -> LiveQuotePoller {
        LiveQuotePoller::new(
            provider,
            cache,
            publisher,
            symbols(tickers),
            Duration::from_secs(60),
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_failing_symbol_does_not_block_others() {
        let provider = Arc::new(ScriptedProvider::default().with_price("MSFT", 410.25));
        let cache = FreshnessCache::default();
        let publisher = Arc::new(RecordingPublisher::default());

        let job = poller(provider.clone(), cache.clone(), publisher.clone(), &["AAPL", "MSFT"]);
        let report = job.run_cycle().await;

        assert_eq!(report, CycleReport { published: 1, failed: 1 });
        assert_eq!(
            *publisher.published.lock(),
            vec![PriceUpdate {
                symbol: "MSFT".to_string(),
                price: 410.25
            }]
        );
        assert_eq!(cache.get_live("MSFT").unwrap().price, 410.25);
        assert!(cache.get_live("AAPL").is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cycle_overwrites_previous_quote() {
        let cache = FreshnessCache::default();
        cache.put_live(LiveQuote::new("AAPL", 100.0));

        let provider = Arc::new(ScriptedProvider::default().with_price("AAPL", 101.5));
        let job = poller(provider, cache.clone(), Arc::new(RecordingPublisher::default()), &["AAPL"]);
        job.run_cycle().await;

        assert_eq!(cache.get_live("AAPL").unwrap().price, 101.5);
        assert_eq!(cache.live_quotes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_symbol_does_not_delay_ready_updates() {
        let provider = Arc::new(
            ScriptedProvider::default()
                .with_price("AAPL", 190.0)
                .with_price("NVDA", 880.0)
                .with_delay("AAPL", Duration::from_secs(5)),
        );
        let hub = PriceBroadcast::new(8);
        let mut subscriber = hub.subscribe();

        let job = poller(provider, FreshnessCache::default(), Arc::new(hub), &["AAPL", "NVDA"]);
        let cycle = tokio::spawn(async move { job.run_cycle().await });

        let first = subscriber.recv().await.unwrap();
        assert_eq!(first.symbol, "NVDA");
        assert!(!cycle.is_finished());

        let second = subscriber.recv().await.unwrap();
        assert_eq!(second.symbol, "AAPL");
        assert_eq!(cycle.await.unwrap(), CycleReport { published: 2, failed: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_counts_as_failure() {
        let provider = Arc::new(
            ScriptedProvider::default()
                .with_price("AAPL", 190.0)
                .with_price("MSFT", 410.0)
                .with_delay("AAPL", Duration::from_secs(30)),
        );
        let publisher = Arc::new(RecordingPublisher::default());

        let job = poller(provider, FreshnessCache::default(), publisher.clone(), &["AAPL", "MSFT"]);
        let report = job.run_cycle().await;

        assert_eq!(report, CycleReport { published: 1, failed: 1 });
        assert_eq!(publisher.published.lock()[0].symbol, "MSFT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_repeats_on_fixed_period() {
        let provider = Arc::new(
            ScriptedProvider::default()
                .with_price("AAPL", 190.0)
                .with_price("MSFT", 410.0),
        );
        let publisher = Arc::new(RecordingPublisher::default());

        let job = poller(provider.clone(), FreshnessCache::default(), publisher.clone(), &["AAPL", "MSFT"]);
        let handle = job.spawn();

        // Ticks at 0s, 60s and 120s
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 6);
        assert_eq!(publisher.published.lock().len(), 6);
        assert!(!handle.is_finished());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_wait_does_not_count_against_fetch_timeout() {
        let tickers = ["AAPL", "MSFT", "NVDA", "GOOGL", "AMZN"];
        let provider = tickers
            .iter()
            .fold(ScriptedProvider::default(), |p, t| p.with_price(t, 100.0));
        let provider = Arc::new(provider);
        let publisher = Arc::new(RecordingPublisher::default());

        // Five requests per minute: starts 12s apart, longer than the 10s timeout
        let job = poller(provider.clone(), FreshnessCache::default(), publisher.clone(), &tickers)
            .with_rate_limiter(RateLimiter::new(tickers.len(), 5));

        for cycle in 1..=3 {
            let started = tokio::time::Instant::now();
            let report = job.run_cycle().await;

            assert_eq!(report, CycleReport { published: 5, failed: 0 }, "cycle {}", cycle);
            assert!(started.elapsed() >= Duration::from_secs(48));
        }

        assert_eq!(provider.calls.load(Ordering::SeqCst), 15);
        let mut seen: Vec<String> = publisher
            .published
            .lock()
            .iter()
            .map(|u| u.symbol.clone())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen, vec!["AAPL", "AMZN", "GOOGL", "MSFT", "NVDA"]);
    }

    /// Panics on its first call, then quotes normally.
    #[derive(Default)]
    struct PanicsOnceProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LiveQuoteProvider for PanicsOnceProvider {
        async fn fetch_live(&self, symbol: &str) -> Result<LiveQuote, PriceProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("malformed upstream payload");
            }
            Ok(LiveQuote::new(symbol, 190.0))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_cycle_does_not_stop_the_loop() {
        let provider = Arc::new(PanicsOnceProvider::default());
        let publisher = Arc::new(RecordingPublisher::default());

        let job = LiveQuotePoller::new(
            provider.clone(),
            FreshnessCache::default(),
            publisher.clone(),
            symbols(&["AAPL"]),
            Duration::from_secs(60),
            Duration::from_secs(10),
        );
        let handle = job.spawn();

        // First cycle at 0s panics, second at 60s publishes
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            *publisher.published.lock(),
            vec![PriceUpdate {
                symbol: "AAPL".to_string(),
                price: 190.0
            }]
        );
        assert!(!handle.is_finished());

        handle.abort();
    }

    struct FlatHistory;

    #[async_trait]
    impl HistoryProvider for FlatHistory {
        async fn fetch_history(
            &self,
            symbol: &str,
            _range: DateRange,
        ) -> Result<PriceSeries, PriceProviderError> {
            Ok(PriceSeries::new(symbol, Vec::new()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_evicts_expired_history() {
        let cache = FreshnessCache::new(Duration::from_secs(300))
            .with_max_stale(Duration::from_secs(600));
        for month in 1..=6 {
            let start = NaiveDate::from_ymd_opt(2024, month, 1).unwrap();
            let end = NaiveDate::from_ymd_opt(2024, month, 28).unwrap();
            let range = DateRange::new(start, end).unwrap();
            cache.get_series(&FlatHistory, "AAPL", range).await.unwrap();
        }

        let provider = Arc::new(ScriptedProvider::default().with_price("AAPL", 190.0));
        let job = poller(provider, cache.clone(), Arc::new(RecordingPublisher::default()), &["AAPL"]);
        let handle = job.spawn();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(cache.len(), 7);

        // The sweep after the 600s cycle drops all six history entries
        tokio::time::sleep(Duration::from_secs(670)).await;
        assert_eq!(cache.len(), 1);
        assert!(cache.get_live("AAPL").is_some());

        handle.abort();
    }
}

use std::sync::Arc;

use stockpulse_backend::app;
use stockpulse_backend::config::AppConfig;
use stockpulse_backend::external::marketstack::MarketstackProvider;
use stockpulse_backend::external::yahoofinance::YahooFinanceProvider;
use stockpulse_backend::jobs::live_quote_job::LiveQuotePoller;
use stockpulse_backend::logging::{init_logging, LoggingConfig};
use stockpulse_backend::services::broadcast::PriceBroadcast;
use stockpulse_backend::services::freshness_cache::FreshnessCache;
use stockpulse_backend::services::rate_limiter::RateLimiter;
use stockpulse_backend::state::AppState;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())?;

    let config = AppConfig::from_env()?;
    tracing::info!("Loaded configuration: {:?}", config);

    let client = reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (compatible; StockPulse/0.1)")
        .timeout(config.provider_timeout)
        .build()?;

    let history_provider = Arc::new(YahooFinanceProvider::new(
        client.clone(),
        config.yahoo_base_url.clone(),
    ));
    let live_provider = Arc::new(MarketstackProvider::new(
        client,
        config.marketstack_base_url.clone(),
        config.marketstack_api_key.clone(),
    ));

    let symbols = Arc::new(config.tracked_symbols.clone());
    let cache = FreshnessCache::new(config.cache_ttl).with_max_stale(config.cache_max_stale);
    let broadcast = PriceBroadcast::new(config.broadcast_capacity);

    let poller = LiveQuotePoller::new(
        live_provider,
        cache.clone(),
        Arc::new(broadcast.clone()),
        symbols.clone(),
        config.poll_interval,
        config.provider_timeout,
    )
    .with_rate_limiter(RateLimiter::new(
        config.tracked_symbols.len(),
        config.live_requests_per_minute,
    ));
    let poller_handle = poller.spawn();

    let state = AppState {
        cache,
        history_provider,
        broadcast,
        symbols,
        alert_threshold_pct: config.alert_threshold_pct,
    };
    let app = app::create_app(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("🚀 StockPulse backend running at http://{}/", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller_handle.abort();
    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

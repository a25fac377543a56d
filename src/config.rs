use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::models::{SymbolListError, TrackedSymbols};

pub const DEFAULT_TRACKED_SYMBOLS: &str =
    "AAPL:Apple,MSFT:Microsoft,NVDA:Nvidia,GOOGL:Alphabet,AMZN:Amazon";
pub const DEFAULT_MARKETSTACK_BASE_URL: &str = "http://api.marketstack.com/v1";
pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("TRACKED_SYMBOLS: {0}")]
    Symbols(#[from] SymbolListError),
}

/// Service configuration, read once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Marketstack access key. Sent upstream as a query parameter; never logged.
    pub marketstack_api_key: String,
    pub marketstack_base_url: String,
    pub yahoo_base_url: String,
    pub cache_ttl: Duration,
    /// History entries older than this are evicted and no longer stale-served.
    pub cache_max_stale: Duration,
    pub poll_interval: Duration,
    pub provider_timeout: Duration,
    pub alert_threshold_pct: f64,
    pub broadcast_capacity: usize,
    pub live_requests_per_minute: u32,
    pub tracked_symbols: TrackedSymbols,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name -> value source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let marketstack_api_key = lookup("MARKETSTACK_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("MARKETSTACK_API_KEY"))?;

        let tracked_symbols = TrackedSymbols::parse(
            &lookup("TRACKED_SYMBOLS").unwrap_or_else(|| DEFAULT_TRACKED_SYMBOLS.to_string()),
        )?;

        let alert_threshold_pct: f64 = parse_or(&lookup, "ALERT_THRESHOLD_PCT", 5.0)?;
        if !alert_threshold_pct.is_finite() || alert_threshold_pct < 0.0 {
            return Err(ConfigError::Invalid {
                name: "ALERT_THRESHOLD_PCT",
                value: alert_threshold_pct.to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }

        let cache_ttl_secs = positive(&lookup, "CACHE_TTL_SECS", 300)?;
        let cache_max_stale_secs = positive(&lookup, "CACHE_MAX_STALE_SECS", cache_ttl_secs * 12)?;
        if cache_max_stale_secs < cache_ttl_secs {
            return Err(ConfigError::Invalid {
                name: "CACHE_MAX_STALE_SECS",
                value: cache_max_stale_secs.to_string(),
                reason: "must not be shorter than CACHE_TTL_SECS".to_string(),
            });
        }

        // Every tracked symbol has to get its request slot within one period
        let poll_interval_secs = positive(&lookup, "POLL_INTERVAL_SECS", 60)?;
        let live_requests_per_minute = positive(&lookup, "LIVE_REQUESTS_PER_MINUTE", 60)?;
        let per_period = live_requests_per_minute * poll_interval_secs / 60;
        if (tracked_symbols.len() as u64) > per_period {
            return Err(ConfigError::Invalid {
                name: "LIVE_REQUESTS_PER_MINUTE",
                value: live_requests_per_minute.to_string(),
                reason: format!(
                    "{} tracked symbols need more than {} requests per {}s poll",
                    tracked_symbols.len(),
                    per_period,
                    poll_interval_secs
                ),
            });
        }

        Ok(Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            marketstack_api_key,
            marketstack_base_url: lookup("MARKETSTACK_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MARKETSTACK_BASE_URL.to_string()),
            yahoo_base_url: lookup("YAHOO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_YAHOO_BASE_URL.to_string()),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            cache_max_stale: Duration::from_secs(cache_max_stale_secs),
            poll_interval: Duration::from_secs(poll_interval_secs),
            provider_timeout: Duration::from_secs(positive(&lookup, "PROVIDER_TIMEOUT_SECS", 10)?),
            alert_threshold_pct,
            broadcast_capacity: positive(&lookup, "BROADCAST_CAPACITY", 64)? as usize,
            live_requests_per_minute: live_requests_per_minute as u32,
            tracked_symbols,
        })
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("marketstack_api_key", &"<redacted>")
            .field("marketstack_base_url", &self.marketstack_base_url)
            .field("yahoo_base_url", &self.yahoo_base_url)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_max_stale", &self.cache_max_stale)
            .field("poll_interval", &self.poll_interval)
            .field("provider_timeout", &self.provider_timeout)
            .field("alert_threshold_pct", &self.alert_threshold_pct)
            .field("broadcast_capacity", &self.broadcast_capacity)
            .field("live_requests_per_minute", &self.live_requests_per_minute)
            .field("tracked_symbols", &self.tracked_symbols.tickers())
            .finish()
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            })
        }
    }
}

fn positive<F>(lookup: &F, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value: u64 = parse_or(lookup, name, default)?;
    if value == 0 || value > u32::MAX as u64 {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "must be between 1 and 4294967295".to_string(),
        });
    }
    Ok(value)
}

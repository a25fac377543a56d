use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DateRange, LiveQuote, PriceSeries};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PriceProviderError {
    /// The provider answered but had no bars or quote for the symbol.
    #[error("no data found for {0}")]
    NoData(String),

    /// Transport, HTTP status, timeout or an unreadable body.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),
}

/// Daily bar history for arbitrary symbols. No caching happens here.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn fetch_history(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<PriceSeries, PriceProviderError>;
}

/// Latest close for a tracked symbol, served by a separate upstream.
#[async_trait]
pub trait LiveQuoteProvider: Send + Sync {
    async fn fetch_live(&self, symbol: &str) -> Result<LiveQuote, PriceProviderError>;
}

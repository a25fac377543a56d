use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Most recent close for a tracked symbol, as seen by the last poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveQuote {
    pub symbol: String,
    pub price: f64,
    pub fetched_at: DateTime<Utc>,
}

impl LiveQuote {
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            fetched_at: Utc::now(),
        }
    }

    pub fn to_update(&self) -> PriceUpdate {
        PriceUpdate {
            symbol: self.symbol.clone(),
            price: self.price,
        }
    }
}

// Payload pushed to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: f64,
}

use std::sync::Arc;

use crate::external::price_provider::HistoryProvider;
use crate::models::TrackedSymbols;
use crate::services::broadcast::PriceBroadcast;
use crate::services::freshness_cache::FreshnessCache;

#[derive(Clone)]
pub struct AppState {
    pub cache: FreshnessCache,
    pub history_provider: Arc<dyn HistoryProvider>,
    pub broadcast: PriceBroadcast,
    pub symbols: Arc<TrackedSymbols>,
    pub alert_threshold_pct: f64,
}

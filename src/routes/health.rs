use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::debug;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    tracked_symbols: usize,
    live_quotes: usize,
    cache_entries: usize,
    subscribers: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    debug!("GET /health - Health check");
    Json(HealthStatus {
        status: "OK",
        tracked_symbols: state.symbols.len(),
        live_quotes: state.cache.live_quotes().len(),
        cache_entries: state.cache.len(),
        subscribers: state.broadcast.subscriber_count(),
    })
}

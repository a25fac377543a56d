use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::errors::AppError;
use crate::models::LiveQuote;
use crate::services::price_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_live_quotes))
        .route("/:symbol", get(get_live_quote))
}

pub async fn list_live_quotes(State(state): State<AppState>) -> Json<Vec<LiveQuote>> {
    Json(state.cache.live_quotes())
}

pub async fn get_live_quote(
    Path(symbol): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<LiveQuote>, AppError> {
    let symbol = price_service::normalize_symbol(&symbol)?;
    let quote = price_service::latest_quote(&state.cache, &state.symbols, &symbol)?;
    Ok(Json(quote))
}

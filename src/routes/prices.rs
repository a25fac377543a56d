use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::{ChangeAlert, DateRange, PriceSeries};
use crate::routes::RangeQuery;
use crate::services::{change_detector, price_service};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:symbol", get(get_prices))
        .route("/:symbol/export.csv", get(export_csv))
}

#[derive(Debug, Serialize)]
pub struct PriceHistoryResponse {
    pub symbol: String,
    pub name: String,
    pub range: DateRange,
    pub fetched_at: DateTime<Utc>,
    pub stale: bool,
    pub series: Arc<PriceSeries>,
    pub alert: Option<ChangeAlert>,
    pub notification: Option<String>,
}

pub async fn get_prices(
    Path(symbol): Path<String>,
    Query(query): Query<RangeQuery>,
    State(state): State<AppState>,
) -> Result<Json<PriceHistoryResponse>, AppError> {
    let symbol = price_service::normalize_symbol(&symbol)?;
    let range = price_service::resolve_range(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        price_service::today(),
    )?;
    info!("GET /prices/{} - {} to {}", symbol, range.start, range.end);

    let history = price_service::get_history(
        &state.cache,
        state.history_provider.as_ref(),
        &symbol,
        range,
    )
    .await?;

    let alert = change_detector::check(&history.value, state.alert_threshold_pct);

    Ok(Json(PriceHistoryResponse {
        name: state.symbols.display_name(&symbol).to_string(),
        notification: alert.as_ref().map(ChangeAlert::message),
        symbol,
        range,
        fetched_at: history.fetched_at,
        stale: history.stale,
        series: history.value,
        alert,
    }))
}

pub async fn export_csv(
    Path(symbol): Path<String>,
    Query(query): Query<RangeQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let symbol = price_service::normalize_symbol(&symbol)?;
    let range = price_service::resolve_range(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        price_service::today(),
    )?;
    info!("GET /prices/{}/export.csv - {} to {}", symbol, range.start, range.end);

    let history = price_service::get_history(
        &state.cache,
        state.history_provider.as_ref(),
        &symbol,
        range,
    )
    .await?;
    let body = price_service::series_to_csv(&history.value)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}_stock_data.csv\"", symbol),
            ),
        ],
        body,
    ))
}

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::ChangeAlert;
use crate::services::price_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:symbol", get(get_alert))
}

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Percentage threshold; the configured default applies when absent.
    pub threshold: Option<f64>,
}

/// Latest close-to-close alert for a symbol, `null` when the move is below threshold.
pub async fn get_alert(
    Path(symbol): Path<String>,
    Query(query): Query<AlertQuery>,
    State(state): State<AppState>,
) -> Result<Json<Option<ChangeAlert>>, AppError> {
    let symbol = price_service::normalize_symbol(&symbol)?;
    let range = price_service::resolve_range(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        price_service::today(),
    )?;

    let threshold = query.threshold.unwrap_or(state.alert_threshold_pct);
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(AppError::Validation(format!("invalid threshold {}", threshold)));
    }
    info!("GET /alerts/{} - threshold {}%", symbol, threshold);

    let alert = price_service::latest_alert(
        &state.cache,
        state.history_provider.as_ref(),
        &symbol,
        range,
        threshold,
    )
    .await?;

    Ok(Json(alert))
}

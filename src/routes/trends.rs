use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::DateRange;
use crate::routes::RangeQuery;
use crate::services::price_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_trends))
}

#[derive(Debug, Serialize)]
pub struct TrendLine {
    pub symbol: String,
    pub name: String,
    pub closes: Vec<(DateTime<Utc>, f64)>,
}

#[derive(Debug, Serialize)]
pub struct TrendsResponse {
    pub range: DateRange,
    pub lines: Vec<TrendLine>,
}

/// Close-price lines for every tracked symbol over one range. Symbols whose
/// history cannot be loaded are left out rather than failing the request.
pub async fn get_trends(
    Query(query): Query<RangeQuery>,
    State(state): State<AppState>,
) -> Result<Json<TrendsResponse>, AppError> {
    let range = price_service::resolve_range(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        price_service::today(),
    )?;
    info!("GET /trends - {} to {}", range.start, range.end);

    let loads = state.symbols.iter().map(|symbol| {
        let state = &state;
        async move {
            let history = price_service::get_history(
                &state.cache,
                state.history_provider.as_ref(),
                &symbol.ticker,
                range,
            )
            .await;
            (symbol, history)
        }
    });

    let lines = join_all(loads)
        .await
        .into_iter()
        .filter_map(|(symbol, history)| match history {
            Ok(history) => Some(TrendLine {
                symbol: symbol.ticker.clone(),
                name: symbol.name.clone(),
                closes: history
                    .value
                    .points()
                    .iter()
                    .map(|p| (p.timestamp, p.close))
                    .collect(),
            }),
            Err(e) => {
                warn!("Leaving {} out of trends: {}", symbol.ticker, e);
                None
            }
        })
        .collect();

    Ok(Json(TrendsResponse { range, lines }))
}

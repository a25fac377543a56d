use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::models::Symbol;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_symbols))
}

pub async fn list_symbols(State(state): State<AppState>) -> Json<Vec<Symbol>> {
    Json(state.symbols.iter().cloned().collect())
}

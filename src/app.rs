use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::routes::{alerts, health, live, prices, symbols, trends, ws};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/symbols", symbols::router())
        .nest("/api/prices", prices::router())
        .nest("/api/alerts", alerts::router())
        .nest("/api/trends", trends::router())
        .nest("/api/live", live::router())
        .nest("/ws", ws::router())
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

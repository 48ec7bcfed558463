use super::handlers;
use super::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Routes: `POST /query` (and its `/api/` alias) plus `GET /health`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/query", post(handlers::query))
        .route("/api/", post(handlers::query))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::rest::{cold, events};
use super::state::AppState;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Cold tier ops
        .route("/api/cold/status", get(cold::get_status))
        .route("/api/cold/:service_id/summary", get(cold::get_summary))
        .route("/api/cold/:service_id/progress", get(cold::get_progress))
        .route("/api/cold/:service_id/export", post(cold::trigger_export))
        // Hybrid reads
        .route("/api/events", get(events::read_events))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

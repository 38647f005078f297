use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::application::LeaseService;

use super::handlers::{health_handler, leases_handler, summary_handler, AppState};

pub fn create_router(lease_service: Arc<LeaseService>) -> Router {
    let state = AppState { lease_service };

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/leases", get(leases_handler))
        .route("/api/summary", get(summary_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

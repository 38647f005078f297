use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::warn;

use crate::application::LeaseService;
use crate::domain::{Lease, LeaseError, LeaseSnapshot};

/// Refresh failure surfaced to HTTP clients
#[derive(Debug)]
pub struct AppError(LeaseError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        warn!("Request failed: {}", self.0);
        (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string()).into_response()
    }
}

impl From<LeaseError> for AppError {
    fn from(err: LeaseError) -> Self {
        AppError(err)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub lease_service: Arc<LeaseService>,
}

/// Response for /api/summary
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub modified: Option<String>,
    pub parsed_at: Option<NaiveDateTime>,
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub warnings: usize,
}

impl From<&LeaseSnapshot> for SummaryResponse {
    fn from(snapshot: &LeaseSnapshot) -> Self {
        Self {
            modified: snapshot.modified.map(|m| m.to_rfc3339()),
            parsed_at: snapshot.parsed_at,
            total: snapshot.len(),
            valid: snapshot.valid,
            expired: snapshot.expired,
            warnings: snapshot.warnings,
        }
    }
}

/// One lease keyed by its client identifier
#[derive(Debug, Serialize)]
pub struct LeaseEntry {
    pub client: String,
    #[serde(flatten)]
    pub lease: Lease,
}

/// Response for /api/leases
#[derive(Debug, Serialize)]
pub struct LeasesResponse {
    #[serde(flatten)]
    pub summary: SummaryResponse,
    pub leases: Vec<LeaseEntry>,
}

impl From<&LeaseSnapshot> for LeasesResponse {
    fn from(snapshot: &LeaseSnapshot) -> Self {
        Self {
            summary: SummaryResponse::from(snapshot),
            leases: snapshot
                .sorted()
                .into_iter()
                .map(|(client, lease)| LeaseEntry {
                    client: client.clone(),
                    lease: lease.clone(),
                })
                .collect(),
        }
    }
}

/// Handler for GET /api/health
///
/// Reports the cached lease count without touching the leases file.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let snapshot = state.lease_service.cached();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "service": "leasemon",
            "leases": snapshot.len()
        })),
    )
}

/// Handler for GET /api/leases
pub async fn leases_handler(State(state): State<AppState>) -> Result<Json<LeasesResponse>, AppError> {
    let snapshot = state.lease_service.current().await?;
    Ok(Json(LeasesResponse::from(snapshot.as_ref())))
}

/// Handler for GET /api/summary
pub async fn summary_handler(State(state): State<AppState>) -> Result<Json<SummaryResponse>, AppError> {
    let snapshot = state.lease_service.current().await?;
    Ok(Json(SummaryResponse::from(snapshot.as_ref())))
}

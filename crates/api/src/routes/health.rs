use axum::extract::State;
use axum::{routing::get, Json, Router};
use geohub_core::job::JobType;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Number of jobs in the registry.
    pub jobs: usize,
    /// Whether every job type's script is present on disk.
    pub scripts_available: bool,
}

/// GET /health -- returns service health and script availability.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut scripts_available = true;
    for job_type in JobType::ALL {
        if let Err(e) = state.catalog.descriptor(job_type).verify().await {
            tracing::debug!(job_type = %job_type, error = %e, "Job script unavailable");
            scripts_available = false;
        }
    }

    let status = if scripts_available { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        jobs: state.registry.len(),
        scripts_available,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Health check handler.
///
/// Reports liveness only; the JWKS endpoint is not contacted.
///
/// ```json
/// { "status": "healthy", "issuer": "https://tenant.auth0.com/" }
/// ```
#[instrument(skip_all, name = "authorizer.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        issuer: state.config.issuer.clone(),
    })
}

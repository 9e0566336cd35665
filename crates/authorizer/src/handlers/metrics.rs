//! Prometheus metrics endpoint handler.
//!
//! Unauthenticated. Labels are bounded (effect, failure reason, refresh
//! status) and never carry token material.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
#[tracing::instrument(skip_all, name = "authorizer.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

//! HTTP routes for the authorizer.
//!
//! Defines the Axum router and application state used when the authorizer
//! runs as a standalone service instead of inside the Lambda runtime.

use crate::config::Config;
use crate::decision::DecisionEngine;
use crate::handlers;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Decision engine backed by the JWKS key provider.
    pub engine: Arc<DecisionEngine>,

    /// Service configuration.
    pub config: Config,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/v1/authorize` - Token authorizer decision (POST)
/// - `/v1/health` - Health check endpoint
/// - `/metrics` - Prometheus metrics endpoint
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route("/v1/authorize", post(handlers::authorize))
        .route("/v1/health", get(handlers::health_check))
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    api_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

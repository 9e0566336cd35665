//! Metrics definitions for the authorizer.
//!
//! All metrics follow Prometheus naming conventions:
//! - `authorizer_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `effect`: 2 values (Allow, Deny)
//! - `reason`: bounded by `ValidationError::kind()`
//! - `status`: 2 values (success, error)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Decision latency buckets
/// are sized for a cold JWKS fetch on the first request.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("authorizer_decision".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500,
            ],
        )
        .map_err(|e| format!("Failed to set decision buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record one authorization decision.
///
/// Metric: `authorizer_decisions_total`, `authorizer_decision_duration_seconds`
/// Labels: `effect`
pub fn record_decision(effect: &str, duration: Duration) {
    histogram!("authorizer_decision_duration_seconds",
        "effect" => effect.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("authorizer_decisions_total",
        "effect" => effect.to_string()
    )
    .increment(1);
}

/// Record why a token was rejected.
///
/// Metric: `authorizer_validation_failures_total`
/// Labels: `reason`
pub fn record_validation_failure(reason: &'static str) {
    counter!("authorizer_validation_failures_total",
        "reason" => reason
    )
    .increment(1);
}

/// Record a JWKS fetch.
///
/// Metric: `authorizer_jwks_refresh_total`
/// Labels: `status`
pub fn record_jwks_refresh(status: &'static str) {
    counter!("authorizer_jwks_refresh_total",
        "status" => status
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests execute the recording functions against the global no-op
    // recorder; values are asserted in the HTTP integration tests via /metrics.

    #[test]
    fn test_record_decision() {
        record_decision("Allow", Duration::from_millis(3));
        record_decision("Deny", Duration::from_millis(250));
    }

    #[test]
    fn test_record_validation_failure() {
        record_validation_failure("expired");
        record_validation_failure("invalid_signature");
    }

    #[test]
    fn test_record_jwks_refresh() {
        record_jwks_refresh("success");
        record_jwks_refresh("error");
    }
}

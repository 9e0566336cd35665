//! HTTP mode integration tests.
//!
//! Drives the Axum router with `tower::ServiceExt::oneshot` against a mocked
//! JWKS endpoint.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use authorizer::auth::{JwksClient, JwtValidator};
use authorizer::config::Config;
use authorizer::decision::DecisionEngine;
use authorizer::observability::metrics::init_metrics_recorder;
use authorizer::routes::{self, AppState};
use authorizer_test_utils::*;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;

/// Global metrics handle for test routers
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Router wired to a JWKS server publishing the RS256 test key.
struct TestApp {
    router: Router,
    key: TestRsaKey,
    _jwks: TestJwksServer,
}

impl TestApp {
    async fn spawn() -> Self {
        let key = TestRsaKey::new(TEST_RSA_KID);
        let jwks = TestJwksServer::start(vec![key.jwk_json()]).await;

        let config = Config::from_vars(&jwks.config_vars()).expect("test config should load");
        let jwks_client = Arc::new(JwksClient::from_config(&config));
        let engine = Arc::new(DecisionEngine::new(JwtValidator::new(
            jwks_client,
            config.validator_config(),
        )));

        let state = Arc::new(AppState { engine, config });
        let router = routes::build_routes(state, get_test_metrics_handle());

        Self {
            router,
            key,
            _jwks: jwks,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn authorize(&self, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let (status, bytes) = self
            .send(
                Request::builder()
                    .method(Method::POST)
                    .uri("/v1/authorize")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }
}

fn authorizer_event(token: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "TOKEN",
        "authorizationToken": token,
        "methodArn": TEST_METHOD_ARN
    })
}

#[tokio::test]
async fn test_authorize_valid_token_returns_allow() -> Result<()> {
    let app = TestApp::spawn().await;
    let token = TestTokenBuilder::new().sign(&app.key);

    let (status, body) = app.authorize(authorizer_event(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["principalId"], "user");
    assert_eq!(body["policyDocument"]["Version"], "2012-10-17");
    assert_eq!(body["policyDocument"]["Statement"][0]["Effect"], "Allow");
    assert_eq!(
        body["policyDocument"]["Statement"][0]["Action"],
        serde_json::json!(["execute-api:Invoke"])
    );
    assert_eq!(
        body["policyDocument"]["Statement"][0]["Resource"],
        serde_json::json!([TEST_METHOD_ARN])
    );
    Ok(())
}

#[tokio::test]
async fn test_authorize_invalid_token_returns_deny_with_200() -> Result<()> {
    let app = TestApp::spawn().await;
    let token = TestTokenBuilder::new().expires_in(-3600).sign(&app.key);

    let (status, body) = app.authorize(authorizer_event(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["policyDocument"]["Statement"][0]["Effect"], "Deny");
    Ok(())
}

#[tokio::test]
async fn test_authorize_missing_token_returns_deny() -> Result<()> {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .authorize(serde_json::json!({ "type": "TOKEN", "methodArn": TEST_METHOD_ARN }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["policyDocument"]["Statement"][0]["Effect"], "Deny");
    Ok(())
}

#[tokio::test]
async fn test_authorize_missing_method_arn_returns_400() -> Result<()> {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .authorize(serde_json::json!({ "type": "TOKEN", "authorizationToken": "x" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    Ok(())
}

#[tokio::test]
async fn test_authorize_malformed_json_returns_400() -> Result<()> {
    let app = TestApp::spawn().await;

    let (status, bytes) = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/v1/authorize")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    Ok(())
}

#[tokio::test]
async fn test_health_reports_issuer() -> Result<()> {
    let app = TestApp::spawn().await;

    let (status, bytes) = app
        .send(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["issuer"], TEST_ISSUER);
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_reports_decisions() -> Result<()> {
    let app = TestApp::spawn().await;
    let token = TestTokenBuilder::new().sign(&app.key);
    app.authorize(authorizer_event(&token)).await;

    let (status, bytes) = app
        .send(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    let body = String::from_utf8(bytes)?;
    assert!(body.contains("authorizer_decisions_total"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<()> {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .send(Request::builder().uri("/v1/unknown").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

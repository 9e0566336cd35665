//! Authorize handler.
//!
//! HTTP rendition of the token authorizer invocation: the body is the
//! gateway event, the response is the policy. Every decision, `Allow` or
//! `Deny`, is a 200; only an unparseable event is a 400.

use crate::errors::AuthorizerError;
use crate::models::AuthorizerRequest;
use crate::policy::AuthorizerResponse;
use crate::routes::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/authorize
#[instrument(skip_all, name = "authorizer.http.authorize")]
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AuthorizerRequest>, JsonRejection>,
) -> Result<Json<AuthorizerResponse>, AuthorizerError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(target: "authorizer.http", error = %rejection, "Rejected authorizer event");
        AuthorizerError::BadRequest(rejection.body_text())
    })?;

    let (response, cause) = state
        .engine
        .decide(&request.authorization_token, &request.method_arn)
        .await
        .into_parts();

    if let Some(cause) = cause {
        tracing::warn!(
            target: "authorizer.http",
            reason = cause.kind(),
            error = %cause,
            "Token rejected"
        );
    }

    Ok(Json(response))
}

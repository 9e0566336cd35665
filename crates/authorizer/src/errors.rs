//! Authorizer error types.
//!
//! Two families live here:
//!
//! - [`ValidationError`] - why a token was rejected. Always recovered into a
//!   `Deny` decision; surfaced only for logging and metrics.
//! - [`AuthorizerError`] - process-level failures (configuration, runtime
//!   transport, malformed invocation payloads).
//!
//! Messages returned over HTTP are generic. Actual causes are
//! logged server-side.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Reasons a bearer token failed validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("token exceeds maximum allowed size")]
    TokenTooLarge,

    #[error("token is not a well-formed JWT")]
    MalformedToken,

    #[error("token header is missing the kid")]
    MissingKid,

    #[error("no signing key found for kid '{0}'")]
    KeyNotFound(String),

    #[error("signing keys unavailable: {0}")]
    KeyProviderUnavailable(String),

    #[error("signing key unusable: {0}")]
    UnsupportedKey(String),

    #[error("token signed with an unexpected algorithm")]
    AlgorithmMismatch,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is not valid yet")]
    ImmatureToken,

    #[error("token iat is too far in the future")]
    IatTooFarInFuture,

    #[error("token issuer is not trusted")]
    InvalidIssuer,

    #[error("token audience does not match")]
    InvalidAudience,

    #[error("token claims are invalid: {0}")]
    InvalidClaims(String),

    #[error("custom claims rejected: {0}")]
    CustomClaims(String),
}

impl ValidationError {
    /// Bounded label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::TokenTooLarge => "token_too_large",
            ValidationError::MalformedToken => "malformed_token",
            ValidationError::MissingKid => "missing_kid",
            ValidationError::KeyNotFound(_) => "key_not_found",
            ValidationError::KeyProviderUnavailable(_) => "key_provider_unavailable",
            ValidationError::UnsupportedKey(_) => "unsupported_key",
            ValidationError::AlgorithmMismatch => "algorithm_mismatch",
            ValidationError::InvalidSignature => "invalid_signature",
            ValidationError::Expired => "expired",
            ValidationError::ImmatureToken => "immature",
            ValidationError::IatTooFarInFuture => "iat_in_future",
            ValidationError::InvalidIssuer => "invalid_issuer",
            ValidationError::InvalidAudience => "invalid_audience",
            ValidationError::InvalidClaims(_) => "invalid_claims",
            ValidationError::CustomClaims(_) => "custom_claims",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for ValidationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => ValidationError::InvalidSignature,
            ErrorKind::ExpiredSignature => ValidationError::Expired,
            ErrorKind::ImmatureSignature => ValidationError::ImmatureToken,
            ErrorKind::InvalidIssuer => ValidationError::InvalidIssuer,
            ErrorKind::InvalidAudience => ValidationError::InvalidAudience,
            ErrorKind::InvalidAlgorithm => ValidationError::AlgorithmMismatch,
            ErrorKind::MissingRequiredClaim(claim) => {
                ValidationError::InvalidClaims(format!("missing required claim '{}'", claim))
            }
            ErrorKind::Json(e) => ValidationError::InvalidClaims(e.to_string()),
            ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidKeyFormat => ValidationError::UnsupportedKey(err.to_string()),
            _ => ValidationError::MalformedToken,
        }
    }
}

/// Process-level authorizer errors.
///
/// Maps to HTTP status codes in HTTP mode:
/// - BadRequest: 400 Bad Request
/// - Config, Runtime, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum AuthorizerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lambda runtime error: {0}")]
    Runtime(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error")]
    Internal,
}

impl AuthorizerError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthorizerError::BadRequest(_) => 400,
            AuthorizerError::Config(_) | AuthorizerError::Runtime(_) | AuthorizerError::Internal => {
                500
            }
        }
    }

    /// Error type reported to the Lambda Runtime API.
    pub fn error_type(&self) -> &'static str {
        match self {
            AuthorizerError::Config(_) => "Runtime.ConfigError",
            AuthorizerError::Runtime(_) => "Runtime.TransportError",
            AuthorizerError::BadRequest(_) => "Runtime.InvalidEvent",
            AuthorizerError::Internal => "Runtime.InternalError",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AuthorizerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthorizerError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg.clone())
            }
            AuthorizerError::Config(_) | AuthorizerError::Runtime(_) | AuthorizerError::Internal => {
                tracing::error!(target: "authorizer.errors", error = %self, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

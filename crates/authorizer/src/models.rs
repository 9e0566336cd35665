//! Inbound request model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token authorizer event delivered by the gateway.
///
/// The bearer token is redacted in Debug output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    /// Authorizer type, `"TOKEN"` for bearer token authorizers.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Raw value of the configured identity source (the bearer token).
    #[serde(default)]
    pub authorization_token: String,

    /// ARN of the method being invoked.
    pub method_arn: String,
}

impl fmt::Debug for AuthorizerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizerRequest")
            .field("kind", &self.kind)
            .field("authorization_token", &"[REDACTED]")
            .field("method_arn", &self.method_arn)
            .finish()
    }
}

/// Health check response (HTTP mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub issuer: String,
}

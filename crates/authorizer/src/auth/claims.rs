//! JWT claims structures.
//!
//! [`VerifiedClaims`] holds the registered claims the validator relies on plus
//! an application-defined [`CustomClaims`] payload flattened from the same
//! token body. The `sub` field is redacted in Debug output to prevent exposure
//! in logs.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extension point for application-specific claims.
///
/// Implementors are deserialized from the verified token body and then asked
/// to validate themselves. Returning `Err` rejects the token.
pub trait CustomClaims: DeserializeOwned + Send + Sync + 'static {
    /// Validate the custom claims after signature and standard claims passed.
    fn validate(&self) -> Result<(), String>;
}

/// Default custom claims: the OAuth `scope` string.
///
/// Validation always succeeds; scopes are carried for callers that want them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeClaims {
    /// Space-separated scopes granted to this token.
    #[serde(default)]
    pub scope: String,
}

impl ScopeClaims {
    /// Check if the token has a specific scope.
    ///
    /// Scopes are space-separated in the JWT claims.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }

    /// Get all scopes as a vector.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope.split_whitespace().collect()
    }
}

impl CustomClaims for ScopeClaims {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Claims of a token that passed signature and standard-claim validation.
#[derive(Clone, Deserialize)]
pub struct VerifiedClaims<C> {
    /// Subject - redacted in Debug output.
    #[serde(default)]
    pub sub: Option<String>,

    /// Issuer.
    pub iss: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default)]
    pub iat: Option<i64>,

    /// Application-defined claims.
    #[serde(flatten)]
    pub custom: C,
}

impl<C: fmt::Debug> fmt::Debug for VerifiedClaims<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedClaims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("custom", &self.custom)
            .finish()
    }
}

//! Builder patterns for test data construction
//!
//! Provides a fluent API for minting signed test tokens.

use crate::crypto_fixtures::TestSigningKey;
use crate::test_ids::{TEST_AUDIENCE, TEST_ISSUER};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Header};
use serde_json::{json, Map, Value};

/// Builder for creating signed test JWTs
///
/// Defaults produce a token the authorizer accepts under the test
/// configuration: trusted issuer, expected audience, one hour lifetime.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("auth0|alice")
///     .with_scope("read:items")
///     .expires_in(600)
///     .sign(&TestRsaKey::new(TEST_RSA_KID));
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    kid_override: Option<Option<String>>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("aud".to_string(), json!(TEST_AUDIENCE));
        claims.insert("sub".to_string(), json!("auth0|test-subject"));
        claims.insert("scope".to_string(), json!(""));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("iat".to_string(), json!(now.timestamp()));

        Self {
            claims,
            kid_override: None,
        }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set the scope (space-separated)
    pub fn with_scope(self, scope: &str) -> Self {
        self.with_claim("scope", json!(scope))
    }

    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set a single audience
    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set an audience list
    pub fn with_audiences(self, audiences: &[&str]) -> Self {
        self.with_claim("aud", json!(audiences))
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(self, seconds: i64) -> Self {
        self.with_claim("exp", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", json!(timestamp))
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        self.with_claim("nbf", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Put `kid` in the header instead of the signing key's own ID
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid_override = Some(Some(kid.to_string()));
        self
    }

    /// Leave `kid` out of the header
    pub fn without_kid(mut self) -> Self {
        self.kid_override = Some(None);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Sign the claims with `key`
    pub fn sign(self, key: &dyn TestSigningKey) -> String {
        let mut header = Header::new(key.algorithm());
        header.typ = Some("JWT".to_string());
        header.kid = match &self.kid_override {
            Some(kid) => kid.clone(),
            None => Some(key.kid().to_string()),
        };

        let claims = self.build();
        encode(&header, &claims, &key.encoding_key()).expect("Failed to sign test token")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

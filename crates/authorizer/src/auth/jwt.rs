//! JWT validation.
//!
//! Validates bearer tokens using public keys resolved through a [`KeyProvider`].
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only the configured algorithm is accepted; the header `alg` must match it
//! - `exp`/`nbf` are validated with the clock skew leeway, `iat` may not be
//!   further in the future than the leeway
//! - `iss` must equal the configured issuer exactly and `aud` must contain the
//!   configured audience

use crate::auth::claims::{CustomClaims, ScopeClaims, VerifiedClaims};
use crate::auth::jwks::{Jwk, KeyProvider};
use crate::errors::ValidationError;
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected before any decoding or cryptographic work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Settings the validator checks tokens against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Expected `iss` value (exact match).
    pub issuer: String,

    /// Audience that must appear in `aud`.
    pub audience: String,

    /// Expected signing algorithm.
    pub algorithm: Algorithm,

    /// Clock skew tolerance for time-based claims.
    pub clock_skew: Duration,
}

/// Verifies a bearer token and yields its claims.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    type Claims: Send;

    /// Validate `token`, returning its claims on success.
    async fn validate(&self, token: &str) -> Result<Self::Claims, ValidationError>;
}

/// JWT validator over keys from a [`KeyProvider`].
///
/// `C` is the custom claims type deserialized from every accepted token and
/// asked to validate itself.
pub struct JwtValidator<C = ScopeClaims> {
    /// Source of verification keys.
    key_provider: Arc<dyn KeyProvider>,

    /// Expected issuer, audience, algorithm and leeway.
    config: ValidatorConfig,

    _claims: PhantomData<fn() -> C>,
}

impl<C: CustomClaims> JwtValidator<C> {
    /// Create a new JWT validator.
    ///
    /// # Arguments
    ///
    /// * `key_provider` - Source of public keys
    /// * `config` - Issuer, audience, algorithm and clock skew to enforce
    pub fn new(key_provider: Arc<dyn KeyProvider>, config: ValidatorConfig) -> Self {
        Self {
            key_provider,
            config,
            _claims: PhantomData,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a JWT and return the claims.
    ///
    /// # Checks
    ///
    /// 1. Size check - reject tokens > 8KB before parsing
    /// 2. Header `alg` must be the configured algorithm, `kid` must be present
    /// 3. Fetch public key for `kid`
    /// 4. Verify signature, `exp`, `nbf`, `iss`, `aud`
    /// 5. Validate `iat` with clock skew tolerance
    /// 6. Run the custom claims hook
    #[instrument(skip_all)]
    pub async fn validate_token(&self, token: &str) -> Result<VerifiedClaims<C>, ValidationError> {
        // 1-2. Header checks (includes size check)
        let kid = self.extract_kid(token)?;

        // 3. Resolve key
        let jwk = self.key_provider.get_key(&kid).await?;
        let decoding_key = decoding_key(&jwk, self.config.algorithm)?;

        // 4. Verify signature and registered claims
        let claims = decode::<VerifiedClaims<C>>(token, &decoding_key, &self.validation())
            .map_err(|e| {
                tracing::debug!(target: "authorizer.jwt", error = %e, "Token verification failed");
                ValidationError::from(e)
            })?
            .claims;

        // 5. iat
        if let Some(iat) = claims.iat {
            validate_iat(iat, self.config.clock_skew)?;
        }

        // 6. Custom claims hook
        claims.custom.validate().map_err(|reason| {
            tracing::debug!(target: "authorizer.jwt", reason = %reason, "Custom claims rejected");
            ValidationError::CustomClaims(reason)
        })?;

        tracing::debug!(target: "authorizer.jwt", "Token validated successfully");
        Ok(claims)
    }

    fn extract_kid(&self, token: &str) -> Result<String, ValidationError> {
        if token.len() > MAX_JWT_SIZE_BYTES {
            tracing::debug!(
                target: "authorizer.jwt",
                token_size = token.len(),
                max_size = MAX_JWT_SIZE_BYTES,
                "Token rejected: size exceeds maximum allowed"
            );
            return Err(ValidationError::TokenTooLarge);
        }

        check_segments(token)?;

        let header = decode_header(token).map_err(|e| {
            tracing::debug!(target: "authorizer.jwt", error = %e, "Failed to decode JWT header");
            ValidationError::MalformedToken
        })?;

        if header.alg != self.config.algorithm {
            tracing::debug!(
                target: "authorizer.jwt",
                alg = ?header.alg,
                expected = ?self.config.algorithm,
                "Token rejected: unexpected algorithm"
            );
            return Err(ValidationError::AlgorithmMismatch);
        }

        header
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or(ValidationError::MissingKid)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.config.algorithm);
        validation.leeway = self.config.clock_skew.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_audience(&[self.config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation
    }
}

#[async_trait]
impl<C: CustomClaims> TokenValidator for JwtValidator<C> {
    type Claims = VerifiedClaims<C>;

    async fn validate(&self, token: &str) -> Result<Self::Claims, ValidationError> {
        self.validate_token(token).await
    }
}

/// Reject anything that is not a three-segment compact JWS with a header.
fn check_segments(token: &str) -> Result<(), ValidationError> {
    let segments = token.split('.').count();
    let header_empty = token.split('.').next().map_or(true, str::is_empty);

    if segments != 3 || header_empty {
        tracing::debug!(
            target: "authorizer.jwt",
            parts = segments,
            "Token rejected: invalid JWT format"
        );
        return Err(ValidationError::MalformedToken);
    }

    Ok(())
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` more than `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), ValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), ValidationError> {
    // Safe cast: clock_skew is bounded by config to 600 seconds
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "authorizer.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(ValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Build a decoding key from a JWK, checking it fits the expected algorithm.
pub fn decoding_key(jwk: &Jwk, algorithm: Algorithm) -> Result<DecodingKey, ValidationError> {
    if let Some(alg) = &jwk.alg {
        if *alg != format!("{:?}", algorithm) {
            tracing::warn!(target: "authorizer.jwt", kid = %jwk.kid, alg = %alg, "JWK algorithm does not match configuration");
            return Err(ValidationError::UnsupportedKey(format!(
                "key '{}' is for {}",
                jwk.kid, alg
            )));
        }
    }

    let expected_kty = match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => "RSA",
        Algorithm::ES256 | Algorithm::ES384 => "EC",
        Algorithm::EdDSA => "OKP",
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            return Err(ValidationError::UnsupportedKey(
                "symmetric algorithms cannot use a JWKS".to_string(),
            ));
        }
    };

    if jwk.kty != expected_kty {
        tracing::warn!(target: "authorizer.jwt", kid = %jwk.kid, kty = %jwk.kty, "Unexpected JWK key type");
        return Err(ValidationError::UnsupportedKey(format!(
            "key '{}' has type {}, expected {}",
            jwk.kid, jwk.kty, expected_kty
        )));
    }

    // EC and OKP keys must name the curve the algorithm signs over
    let expected_crv = match algorithm {
        Algorithm::ES256 => Some("P-256"),
        Algorithm::ES384 => Some("P-384"),
        Algorithm::EdDSA => Some("Ed25519"),
        _ => None,
    };

    if let Some(expected_crv) = expected_crv {
        if jwk.crv.as_deref() != Some(expected_crv) {
            let crv = jwk.crv.as_deref().unwrap_or("none");
            tracing::warn!(target: "authorizer.jwt", kid = %jwk.kid, crv = %crv, "Unexpected JWK curve");
            return Err(ValidationError::UnsupportedKey(format!(
                "key '{}' has curve {}, expected {}",
                jwk.kid, crv, expected_crv
            )));
        }
    }

    let missing = |field: &str| {
        tracing::error!(target: "authorizer.jwt", kid = %jwk.kid, field = %field, "JWK missing component");
        ValidationError::UnsupportedKey(format!("key '{}' is missing '{}'", jwk.kid, field))
    };

    let unusable = |e: jsonwebtoken::errors::Error| {
        tracing::error!(target: "authorizer.jwt", kid = %jwk.kid, error = %e, "JWK components are invalid");
        ValidationError::UnsupportedKey(format!("key '{}' is invalid", jwk.kid))
    };

    let key = match expected_kty {
        "RSA" => {
            let n = jwk.n.as_deref().ok_or_else(|| missing("n"))?;
            let e = jwk.e.as_deref().ok_or_else(|| missing("e"))?;
            DecodingKey::from_rsa_components(n, e).map_err(unusable)?
        }
        "EC" => {
            let x = jwk.x.as_deref().ok_or_else(|| missing("x"))?;
            let y = jwk.y.as_deref().ok_or_else(|| missing("y"))?;
            DecodingKey::from_ec_components(x, y).map_err(unusable)?
        }
        _ => {
            let x = jwk.x.as_deref().ok_or_else(|| missing("x"))?;
            DecodingKey::from_ed_components(x).map_err(unusable)?
        }
    };

    Ok(key)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::StaticKeyProvider;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    fn config(algorithm: Algorithm) -> ValidatorConfig {
        ValidatorConfig {
            issuer: "https://tenant.auth0.com/".to_string(),
            audience: "https://api.example.com".to_string(),
            algorithm,
            clock_skew: Duration::from_secs(60),
        }
    }

    fn validator(algorithm: Algorithm) -> JwtValidator {
        JwtValidator::new(Arc::new(StaticKeyProvider::new(vec![])), config(algorithm))
    }

    fn token_with_header(header: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header.as_bytes());
        let payload_b64 = URL_SAFE_NO_PAD.encode(br#"{"exp":9999999999}"#);
        format!("{}.{}.signature", header_b64, payload_b64)
    }

    fn jwk(kty: &str, alg: Option<&str>) -> Jwk {
        let crv = match kty {
            "OKP" => Some("Ed25519".to_string()),
            "EC" => Some("P-256".to_string()),
            _ => None,
        };
        Jwk {
            kty: kty.to_string(),
            kid: "test-key".to_string(),
            alg: alg.map(ToString::to_string),
            key_use: Some("sig".to_string()),
            n: None,
            e: None,
            crv,
            x: None,
            y: None,
        }
    }

    // =========================================================================
    // Header checks
    // =========================================================================

    #[test]
    fn test_extract_kid_valid_token() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"test-key-01"}"#);
        assert_eq!(
            validator(Algorithm::RS256).extract_kid(&token).unwrap(),
            "test-key-01"
        );
    }

    #[test]
    fn test_extract_kid_missing_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT"}"#);
        assert_eq!(
            validator(Algorithm::RS256).extract_kid(&token),
            Err(ValidationError::MissingKid)
        );
    }

    #[test]
    fn test_extract_kid_empty_kid() {
        let token = token_with_header(r#"{"alg":"RS256","kid":""}"#);
        assert_eq!(
            validator(Algorithm::RS256).extract_kid(&token),
            Err(ValidationError::MissingKid)
        );
    }

    #[test]
    fn test_extract_kid_rejects_algorithm_mismatch() {
        let token = token_with_header(r#"{"alg":"HS256","kid":"test-key"}"#);
        assert_eq!(
            validator(Algorithm::RS256).extract_kid(&token),
            Err(ValidationError::AlgorithmMismatch)
        );
    }

    #[test]
    fn test_extract_kid_malformed_tokens() {
        let v = validator(Algorithm::RS256);
        for token in ["", "single", "only.two", "not.a.valid.jwt.format", ".payload.sig"] {
            assert_eq!(
                v.extract_kid(token),
                Err(ValidationError::MalformedToken),
                "token {:?} should be malformed",
                token
            );
        }
    }

    #[test]
    fn test_extract_kid_invalid_base64_header() {
        assert_eq!(
            validator(Algorithm::RS256).extract_kid("!!!invalid!!!.payload.signature"),
            Err(ValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_extract_kid_invalid_json_header() {
        let header_b64 = URL_SAFE_NO_PAD.encode(b"not valid json");
        let token = format!("{}.payload.signature", header_b64);
        assert_eq!(
            validator(Algorithm::RS256).extract_kid(&token),
            Err(ValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_token_over_size_limit_rejected_first() {
        let token = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            validator(Algorithm::RS256).extract_kid(&token),
            Err(ValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_validation_settings() {
        let validation = validator(Algorithm::RS256).validation();

        assert_eq!(validation.algorithms, vec![Algorithm::RS256]);
        assert_eq!(validation.leeway, 60);
        assert!(validation.validate_exp);
        assert!(validation.validate_nbf);
    }

    // =========================================================================
    // iat
    // =========================================================================

    #[test]
    fn test_validate_iat_within_skew() {
        let now = 1_700_000_000;
        assert!(validate_iat_at(now, Duration::from_secs(60), now).is_ok());
        assert!(validate_iat_at(now + 60, Duration::from_secs(60), now).is_ok());
        assert!(validate_iat_at(now - 3600, Duration::from_secs(60), now).is_ok());
    }

    #[test]
    fn test_validate_iat_beyond_skew() {
        let now = 1_700_000_000;
        assert_eq!(
            validate_iat_at(now + 61, Duration::from_secs(60), now),
            Err(ValidationError::IatTooFarInFuture)
        );
    }

    // =========================================================================
    // JWK -> decoding key
    // =========================================================================

    #[test]
    fn test_decoding_key_rejects_wrong_key_type() {
        let result = decoding_key(&jwk("OKP", None), Algorithm::RS256);
        assert!(matches!(result, Err(ValidationError::UnsupportedKey(msg)) if msg.contains("expected RSA")));
    }

    #[test]
    fn test_decoding_key_rejects_mismatched_jwk_alg() {
        let result = decoding_key(&jwk("RSA", Some("RS512")), Algorithm::RS256);
        assert!(matches!(result, Err(ValidationError::UnsupportedKey(msg)) if msg.contains("RS512")));
    }

    #[test]
    fn test_decoding_key_rejects_missing_rsa_components() {
        let result = decoding_key(&jwk("RSA", Some("RS256")), Algorithm::RS256);
        assert!(matches!(result, Err(ValidationError::UnsupportedKey(msg)) if msg.contains("'n'")));
    }

    #[test]
    fn test_decoding_key_rejects_missing_okp_x() {
        let result = decoding_key(&jwk("OKP", Some("EdDSA")), Algorithm::EdDSA);
        assert!(matches!(result, Err(ValidationError::UnsupportedKey(msg)) if msg.contains("'x'")));
    }

    #[test]
    fn test_decoding_key_accepts_jwk_without_alg() {
        let mut key = jwk("OKP", None);
        key.x = Some("dGVzdC1wdWJsaWMta2V5".to_string());
        assert!(decoding_key(&key, Algorithm::EdDSA).is_ok());
    }

    #[test]
    fn test_decoding_key_accepts_p256_key() {
        // RFC 7515 appendix A.3 public key
        let mut key = jwk("EC", Some("ES256"));
        key.x = Some("f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU".to_string());
        key.y = Some("x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0".to_string());

        let decoding_key = decoding_key(&key, Algorithm::ES256).unwrap();

        // RFC 7515 appendix A.3 ES256 JWS signed by that key
        let token = "eyJhbGciOiJFUzI1NiJ9\
            .eyJpc3MiOiJqb2UiLA0KICJleHAiOjEzMDA4MTkzODAsDQogImh0dHA6Ly9leGFtcGxlLmNvbS9pc19yb290Ijp0cnVlfQ\
            .DtEhU3ljbEg8L38VWAfUAqOyKAM6-Xx-F4GawxaepmXFCgfTjDxw5djxLa8ISlSApmWQxfKTUJqPP3-Kg6NU1Q";
        let mut validation = Validation::new(Algorithm::ES256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<serde_json::Value>(token, &decoding_key, &validation).unwrap();
        assert_eq!(data.claims["iss"], "joe");
    }

    #[test]
    fn test_decoding_key_rejects_ec_curve_mismatch() {
        let mut key = jwk("EC", None);
        key.crv = Some("P-384".to_string());
        key.x = Some("f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU".to_string());
        key.y = Some("x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0".to_string());

        let result = decoding_key(&key, Algorithm::ES256);
        assert!(matches!(result, Err(ValidationError::UnsupportedKey(msg)) if msg.contains("expected P-256")));
    }

    #[test]
    fn test_decoding_key_rejects_x25519_for_eddsa() {
        let mut key = jwk("OKP", None);
        key.crv = Some("X25519".to_string());
        key.x = Some("dGVzdC1wdWJsaWMta2V5".to_string());

        let result = decoding_key(&key, Algorithm::EdDSA);
        assert!(matches!(result, Err(ValidationError::UnsupportedKey(msg)) if msg.contains("X25519")));
    }

    #[test]
    fn test_decoding_key_rejects_okp_without_curve() {
        let mut key = jwk("OKP", None);
        key.crv = None;
        key.x = Some("dGVzdC1wdWJsaWMta2V5".to_string());

        let result = decoding_key(&key, Algorithm::EdDSA);
        assert!(matches!(result, Err(ValidationError::UnsupportedKey(msg)) if msg.contains("curve none")));
    }

    #[test]
    fn test_decoding_key_rejects_symmetric_algorithm() {
        let result = decoding_key(&jwk("oct", None), Algorithm::HS256);
        assert!(matches!(result, Err(ValidationError::UnsupportedKey(_))));
    }

    // =========================================================================
    // validate_token failure paths that need no real key
    // =========================================================================

    #[tokio::test]
    async fn test_validate_unknown_kid_is_key_not_found() {
        let token = token_with_header(r#"{"alg":"RS256","kid":"nobody"}"#);
        let result = validator(Algorithm::RS256).validate(&token).await;
        assert_eq!(
            result.unwrap_err(),
            ValidationError::KeyNotFound("nobody".to_string())
        );
    }

    #[tokio::test]
    async fn test_validate_empty_token_is_malformed() {
        let result = validator(Algorithm::RS256).validate("").await;
        assert_eq!(result.unwrap_err(), ValidationError::MalformedToken);
    }
}

//! Authorization decision engine.
//!
//! Maps the outcome of token validation onto a policy for the requested
//! resource:
//!
//! ```text
//! token ──► TokenValidator ──► Ok(claims)  ──► Allow(resource)
//!                          └─► Err(cause)  ──► Deny(resource) + cause
//! ```
//!
//! `Allow` is produced on exactly one path: the validator returned `Ok`.
//! One validation attempt per request; nothing is cached here.

use crate::auth::{JwtValidator, TokenValidator, ValidationError};
use crate::observability::metrics;
use crate::policy::{build_policy, AuthorizerResponse, Effect, DEFAULT_PRINCIPAL_ID};
use std::time::Instant;
use tracing::instrument;

/// Result of one authorization decision.
///
/// A `Deny` carries the validation failure that caused it so the caller can
/// log it while still returning the `Deny` policy.
#[derive(Debug, Clone)]
pub struct Decision {
    pub response: AuthorizerResponse,
    pub cause: Option<ValidationError>,
}

impl Decision {
    fn allow(resource: &str) -> Self {
        Self {
            response: build_policy(DEFAULT_PRINCIPAL_ID, Some(Effect::Allow), resource),
            cause: None,
        }
    }

    fn deny(resource: &str, cause: ValidationError) -> Self {
        Self {
            response: build_policy(DEFAULT_PRINCIPAL_ID, Some(Effect::Deny), resource),
            cause: Some(cause),
        }
    }

    /// Effect of this decision.
    pub fn effect(&self) -> Effect {
        if self.cause.is_none() {
            Effect::Allow
        } else {
            Effect::Deny
        }
    }

    pub fn into_parts(self) -> (AuthorizerResponse, Option<ValidationError>) {
        (self.response, self.cause)
    }
}

/// Decision engine over a token validator.
pub struct DecisionEngine<V = JwtValidator> {
    validator: V,
}

impl<V: TokenValidator> DecisionEngine<V> {
    pub fn new(validator: V) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// Decide whether `token` may invoke `resource`.
    ///
    /// Never fails: every validation error becomes a `Deny` with the error
    /// attached as `cause`.
    #[instrument(skip_all, name = "authorizer.decide", fields(effect))]
    pub async fn decide(&self, token: &str, resource: &str) -> Decision {
        let start = Instant::now();

        let decision = match self.validator.validate(token).await {
            Ok(_) => Decision::allow(resource),
            Err(cause) => {
                metrics::record_validation_failure(cause.kind());
                Decision::deny(resource, cause)
            }
        };

        let effect = decision.effect();
        tracing::Span::current().record("effect", effect.as_str());
        tracing::debug!(target: "authorizer.decision", effect = %effect, "Decision made");
        metrics::record_decision(effect.as_str(), start.elapsed());

        decision
    }
}

/// Mock token validator for testing.
pub mod mock {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Validator returning a fixed outcome and counting calls.
    pub struct MockTokenValidator {
        outcome: Result<(), ValidationError>,
        call_count: AtomicUsize,
    }

    impl MockTokenValidator {
        /// Create a mock that accepts every token.
        pub fn accepting() -> Self {
            Self {
                outcome: Ok(()),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Create a mock that rejects every token with `error`.
        pub fn rejecting(error: ValidationError) -> Self {
            Self {
                outcome: Err(error),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Number of validations performed.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenValidator for MockTokenValidator {
        type Claims = ();

        async fn validate(&self, _token: &str) -> Result<(), ValidationError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::mock::MockTokenValidator;
    use super::*;
    use crate::policy::Statement;

    const ARN: &str = "arn:aws:execute-api:us-east-1:123456789012:abc/prod/GET/items";

    #[tokio::test]
    async fn test_valid_token_allows_resource() {
        let engine = DecisionEngine::new(MockTokenValidator::accepting());

        let decision = engine.decide("token", ARN).await;

        assert_eq!(decision.effect(), Effect::Allow);
        assert!(decision.cause.is_none());
        let doc = decision.response.policy_document.unwrap();
        assert_eq!(
            doc.statement,
            vec![Statement {
                action: vec!["execute-api:Invoke".to_string()],
                effect: Effect::Allow,
                resource: vec![ARN.to_string()],
            }]
        );
        assert_eq!(decision.response.principal_id, "user");
    }

    #[tokio::test]
    async fn test_invalid_token_denies_with_cause() {
        let engine =
            DecisionEngine::new(MockTokenValidator::rejecting(ValidationError::InvalidSignature));

        let (response, cause) = engine.decide("token", ARN).await.into_parts();

        assert_eq!(response.effect(), Some(Effect::Deny));
        assert_eq!(response.principal_id, "user");
        assert_eq!(cause, Some(ValidationError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_key_provider_failure_denies() {
        let engine = DecisionEngine::new(MockTokenValidator::rejecting(
            ValidationError::KeyProviderUnavailable("JWKS endpoint returned 503".to_string()),
        ));

        let decision = engine.decide("token", ARN).await;

        assert_eq!(decision.effect(), Effect::Deny);
        assert!(matches!(
            decision.cause,
            Some(ValidationError::KeyProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_single_validation_attempt_per_decision() {
        let engine = DecisionEngine::new(MockTokenValidator::rejecting(ValidationError::Expired));

        engine.decide("token", ARN).await;
        engine.decide("token", ARN).await;

        assert_eq!(engine.validator().call_count(), 2);
    }

    #[tokio::test]
    async fn test_decision_is_repeatable() {
        let engine = DecisionEngine::new(MockTokenValidator::accepting());

        let first = engine.decide("token", ARN).await;
        let second = engine.decide("token", ARN).await;

        assert_eq!(first.effect(), second.effect());
        assert_eq!(first.response, second.response);
    }

    #[tokio::test]
    async fn test_empty_resource_yields_principal_only() {
        let engine = DecisionEngine::new(MockTokenValidator::accepting());

        let decision = engine.decide("token", "").await;

        assert!(decision.response.policy_document.is_none());
        assert_eq!(decision.response.principal_id, "user");
    }
}

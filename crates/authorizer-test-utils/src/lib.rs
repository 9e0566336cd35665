//! # Authorizer Test Utilities
//!
//! Shared test utilities for the authorizer.
//!
//! This crate provides:
//! - Deterministic signing keys (Ed25519 from a seed, a fixed RSA key)
//! - Token builders minting real signed JWTs
//! - A mocked JWKS endpoint (TestJwksServer)
//! - Fixed test identifiers (issuer, audience, method ARN)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use authorizer_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let key = TestRsaKey::new("rsa-key-01");
//!     let server = TestJwksServer::start(vec![key.jwk_json()]).await;
//!
//!     let token = TestTokenBuilder::new()
//!         .with_scope("read:items")
//!         .sign(&key);
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use test_ids::*;
pub use token_builders::*;

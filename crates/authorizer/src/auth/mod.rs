//! Token authentication for the authorizer.
//!
//! # Components
//!
//! - `jwks` - key provider: fetches and caches the issuer's public keys
//! - `jwt` - token validator: signature, standard claims and the custom claims hook
//! - `claims` - claims structures, including the [`CustomClaims`] extension point

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use crate::errors::ValidationError;
pub use claims::{CustomClaims, ScopeClaims, VerifiedClaims};
pub use jwks::{Jwk, JwksClient, KeyProvider, StaticKeyProvider};
pub use jwt::{JwtValidator, TokenValidator, ValidatorConfig};

//! Bearer-token authorizer for an API gateway.
//!
//! Validates a JWT issued by an OIDC identity provider against the issuer's
//! published JWKS and answers with an IAM-style policy allowing or denying
//! `execute-api:Invoke` on the requested method ARN.
//!
//! # Architecture
//!
//! ```text
//! runtime.rs (Lambda) ─┐
//!                      ├─► decision.rs ─► auth/jwt.rs ─► auth/jwks.rs
//! routes + handlers ───┘        │
//!                               └─► policy.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - JWKS key provider, JWT validation, claims
//! - `config` - Service configuration from environment
//! - `decision` - Token outcome to policy mapping
//! - `errors` - Validation and process error types
//! - `handlers` - HTTP request handlers
//! - `models` - Inbound event model
//! - `observability` - Prometheus metrics
//! - `policy` - Policy document construction
//! - `routes` - Axum router setup
//! - `runtime` - Lambda Runtime API loop

pub mod auth;
pub mod config;
pub mod decision;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod policy;
pub mod routes;
pub mod runtime;

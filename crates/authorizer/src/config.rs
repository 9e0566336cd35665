//! Authorizer configuration.
//!
//! Configuration is loaded once from environment variables at cold start and
//! passed explicitly from then on. Any error here is fatal: the process must
//! not serve decisions with a partial configuration.

use crate::auth::jwt::ValidatorConfig;
use jsonwebtoken::Algorithm;
use reqwest::Url;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default JWT clock skew tolerance in seconds.
pub const DEFAULT_CLOCK_SKEW_SECONDS: u64 = 60;

/// Maximum allowed JWT clock skew tolerance in seconds (10 minutes).
pub const MAX_CLOCK_SKEW_SECONDS: u64 = 600;

/// Default JWKS cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Maximum JWKS cache TTL in seconds (1 day).
pub const MAX_JWKS_CACHE_TTL_SECONDS: u64 = 86_400;

/// Default timeout for a single JWKS fetch in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Maximum timeout for a single JWKS fetch in seconds.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Default HTTP bind address (HTTP mode only).
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default signing algorithm for issued access tokens.
pub const DEFAULT_SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// Set by the Lambda execution environment.
pub const LAMBDA_RUNTIME_API_VAR: &str = "AWS_LAMBDA_RUNTIME_API";

/// Authorizer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Issuer URL, always `https://{AUTH0_DOMAIN}/`.
    pub issuer: String,

    /// Audience the token must declare.
    pub audience: String,

    /// Expected JWS signing algorithm.
    pub algorithm: Algorithm,

    /// Clock skew tolerance in seconds for exp/nbf/iat validation.
    pub clock_skew_seconds: u64,

    /// Explicit JSON Web Key Set URL (`JWKS_URL`).
    ///
    /// When unset the key set location is discovered from the issuer's
    /// `/.well-known/openid-configuration` document.
    pub jwks_url: Option<String>,

    /// How long a fetched key set stays cached.
    pub jwks_cache_ttl_seconds: u64,

    /// Timeout for a single JWKS fetch.
    pub jwks_fetch_timeout_seconds: u64,

    /// Server bind address for HTTP mode.
    pub bind_address: String,

    /// Lambda Runtime API host (`AWS_LAMBDA_RUNTIME_API`), set when running inside Lambda.
    pub lambda_runtime_api: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid issuer configuration: {0}")]
    InvalidIssuer(String),

    #[error("Invalid signing algorithm configuration: {0}")]
    InvalidAlgorithm(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidClockSkew(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidCacheTtl(String),

    #[error("Invalid JWKS URL configuration: {0}")]
    InvalidJwksUrl(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let domain = required(vars, "AUTH0_DOMAIN")?;
        let issuer = parse_issuer(domain)?;

        let audience = required(vars, "AUTH0_AUDIENCE")?.to_string();

        let algorithm = match vars.get("JWT_SIGNING_ALGORITHM") {
            Some(value) => parse_algorithm(value)?,
            None => DEFAULT_SIGNING_ALGORITHM,
        };

        let clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_CLOCK_SKEW_SECONDS {
                return Err(ConfigError::InvalidClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW_SECONDS, value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW_SECONDS
        };

        let jwks_cache_ttl_seconds = if let Some(value_str) = vars.get("JWKS_CACHE_TTL_SECONDS")
        {
            parse_bounded(value_str, MAX_JWKS_CACHE_TTL_SECONDS).map_err(|reason| {
                ConfigError::InvalidCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS {}, got '{}'",
                    reason, value_str
                ))
            })?
        } else {
            DEFAULT_JWKS_CACHE_TTL_SECONDS
        };

        let jwks_fetch_timeout_seconds =
            if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
                parse_bounded(value_str, MAX_JWKS_FETCH_TIMEOUT_SECONDS).map_err(|reason| {
                    ConfigError::InvalidTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS {}, got '{}'",
                        reason, value_str
                    ))
                })?
            } else {
                DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS
            };

        let jwks_url = match vars.get("JWKS_URL") {
            Some(url) => {
                Url::parse(url).map_err(|e| {
                    ConfigError::InvalidJwksUrl(format!("JWKS_URL '{}' is not a URL: {}", url, e))
                })?;
                Some(url.clone())
            }
            None => None,
        };

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let lambda_runtime_api = vars
            .get(LAMBDA_RUNTIME_API_VAR)
            .filter(|value| !value.trim().is_empty())
            .cloned();

        Ok(Config {
            issuer,
            audience,
            algorithm,
            clock_skew_seconds,
            jwks_url,
            jwks_cache_ttl_seconds,
            jwks_fetch_timeout_seconds,
            bind_address,
            lambda_runtime_api,
        })
    }

    /// Validator settings derived from this configuration.
    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            algorithm: self.algorithm,
            clock_skew: Duration::from_secs(self.clock_skew_seconds),
        }
    }

    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }

    pub fn jwks_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_fetch_timeout_seconds)
    }
}

fn required<'a>(vars: &'a HashMap<String, String>, key: &str) -> Result<&'a str, ConfigError> {
    vars.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Build the issuer URL from the tenant domain.
///
/// The issuer must keep the trailing slash: it is compared byte-for-byte with
/// the `iss` claim.
fn parse_issuer(domain: &str) -> Result<String, ConfigError> {
    let candidate = format!("https://{}/", domain);
    let url = Url::parse(&candidate).map_err(|e| {
        ConfigError::InvalidIssuer(format!(
            "AUTH0_DOMAIN '{}' does not form a valid issuer URL: {}",
            domain, e
        ))
    })?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidIssuer(format!(
            "AUTH0_DOMAIN '{}' has no host",
            domain
        )));
    }

    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::InvalidIssuer(format!(
            "AUTH0_DOMAIN '{}' must be a bare domain name",
            domain
        )));
    }

    Ok(url.to_string())
}

fn parse_algorithm(value: &str) -> Result<Algorithm, ConfigError> {
    let algorithm = Algorithm::from_str(value.trim()).map_err(|_| {
        ConfigError::InvalidAlgorithm(format!(
            "JWT_SIGNING_ALGORITHM '{}' is not a known JWS algorithm",
            value
        ))
    })?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Err(ConfigError::InvalidAlgorithm(format!(
                "JWT_SIGNING_ALGORITHM '{}' is symmetric; only public-key algorithms can be verified against a JWKS",
                value
            )))
        }
        _ => Ok(algorithm),
    }
}

fn parse_bounded(value_str: &str, max: u64) -> Result<u64, String> {
    let value: u64 = value_str
        .parse()
        .map_err(|e| format!("must be a valid positive integer ({})", e))?;

    if value == 0 {
        return Err("must be greater than 0".to_string());
    }

    if value > max {
        return Err(format!("must not exceed {}", max));
    }

    Ok(value)
}

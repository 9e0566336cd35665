//! JWKS client for fetching and caching the issuer's public signing keys.
//!
//! The JWKS (JSON Web Key Set) client fetches public keys from the issuer and
//! caches them with a configurable TTL. The key set URL is either configured
//! explicitly or resolved from the `jwks_uri` of the issuer's
//! `/.well-known/openid-configuration` discovery document.
//!
//! # Caching
//!
//! - The whole key set is cached; it is owned by the client and scoped to the process
//! - Cache is invalidated on TTL expiry to pick up key rotations
//! - An unknown `kid` against a fresh cache is rejected without refetching
//! - A failed fetch surfaces immediately; there is no retry
//! - A discovered `jwks_uri` is resolved once and kept for the process lifetime

use crate::config::Config;
use crate::errors::ValidationError;
use crate::observability::metrics;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, RwLock};
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Default fetch timeout in seconds.
const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// OIDC discovery document location relative to the issuer URL.
const DISCOVERY_PATH: &str = ".well-known/openid-configuration";

/// Discovery document URL for an issuer
/// (`https://tenant/` -> `https://tenant/.well-known/openid-configuration`).
pub fn discovery_url(issuer: &str) -> String {
    if issuer.ends_with('/') {
        format!("{}{}", issuer, DISCOVERY_PATH)
    } else {
        format!("{}/{}", issuer, DISCOVERY_PATH)
    }
}

/// JSON Web Key from a JWKS endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key type ("RSA", "EC" or "OKP").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    ///
    /// Keys published without one can never be selected.
    #[serde(default)]
    pub kid: String,

    /// Algorithm the key is meant for, if declared.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name for EC/OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// EC x coordinate or OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS response body.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// The part of the OIDC discovery document the client reads.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenIdConfiguration {
    /// Location of the issuer's key set.
    pub jwks_uri: String,
}

/// Resolves signing keys by key ID.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Look up the verification key for `kid`.
    async fn get_key(&self, kid: &str) -> Result<Jwk, ValidationError>;
}

/// Cached JWKS data with expiry time.
struct CachedJwks {
    /// Map of key ID to JWK.
    keys: HashMap<String, Jwk>,

    /// When this cache entry expires.
    expires_at: Instant,
}

/// Where the key set is fetched from.
enum KeySetLocation {
    /// Configured key set URL.
    Fixed(String),

    /// Key set URL resolved from the issuer's discovery document.
    Discovered {
        discovery_url: String,
        jwks_uri: OnceCell<String>,
    },
}

/// JWKS client for fetching and caching public keys.
pub struct JwksClient {
    /// Key set location.
    location: KeySetLocation,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Cached JWKS data.
    cache: Arc<RwLock<Option<CachedJwks>>>,

    /// Cache TTL duration.
    cache_ttl: Duration,
}

impl JwksClient {
    /// Create a new JWKS client with default TTL and timeout.
    pub fn new(jwks_url: String) -> Self {
        Self::with_options(
            jwks_url,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
        )
    }

    /// Create a new JWKS client with custom cache TTL and fetch timeout.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL to the issuer's JWKS endpoint
    /// * `cache_ttl` - How long to cache JWKS before refreshing
    /// * `fetch_timeout` - Timeout for one JWKS fetch
    pub fn with_options(jwks_url: String, cache_ttl: Duration, fetch_timeout: Duration) -> Self {
        Self::build(KeySetLocation::Fixed(jwks_url), cache_ttl, fetch_timeout)
    }

    /// Create a JWKS client that discovers the key set URL from `issuer`.
    ///
    /// The discovery document is fetched on first use; a failure is retried
    /// on the next refresh.
    pub fn with_discovery(issuer: &str, cache_ttl: Duration, fetch_timeout: Duration) -> Self {
        Self::build(
            KeySetLocation::Discovered {
                discovery_url: discovery_url(issuer),
                jwks_uri: OnceCell::new(),
            },
            cache_ttl,
            fetch_timeout,
        )
    }

    /// Create the client described by `config`: the explicit `JWKS_URL` when
    /// set, discovery from the issuer otherwise.
    pub fn from_config(config: &Config) -> Self {
        match &config.jwks_url {
            Some(jwks_url) => Self::with_options(
                jwks_url.clone(),
                config.jwks_cache_ttl(),
                config.jwks_fetch_timeout(),
            ),
            None => Self::with_discovery(
                &config.issuer,
                config.jwks_cache_ttl(),
                config.jwks_fetch_timeout(),
            ),
        }
    }

    fn build(location: KeySetLocation, cache_ttl: Duration, fetch_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "authorizer.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            location,
            http_client,
            cache: Arc::new(RwLock::new(None)),
            cache_ttl,
        }
    }

    /// URL this client fetches keys from, once known.
    ///
    /// `None` while a discovered location has not been resolved yet.
    pub fn jwks_url(&self) -> Option<&str> {
        match &self.location {
            KeySetLocation::Fixed(url) => Some(url.as_str()),
            KeySetLocation::Discovered { jwks_uri, .. } => jwks_uri.get().map(String::as_str),
        }
    }

    /// Refresh the JWKS cache by fetching from the issuer.
    #[instrument(skip(self))]
    async fn refresh_cache(&self) -> Result<(), ValidationError> {
        let jwks = match self.fetch().await {
            Ok(jwks) => {
                metrics::record_jwks_refresh("success");
                jwks
            }
            Err(e) => {
                metrics::record_jwks_refresh("error");
                return Err(e);
            }
        };

        // Only signing keys are usable for verification
        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .filter(|key| key.key_use.as_deref().map_or(true, |u| u == "sig"))
            .filter(|key| !key.kid.is_empty())
            .map(|key| (key.kid.clone(), key))
            .collect();

        tracing::info!(
            target: "authorizer.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        let now = Instant::now();
        let expires_at = now.checked_add(self.cache_ttl).unwrap_or_else(|| {
            tracing::warn!(
                target: "authorizer.jwks",
                ttl_seconds = self.cache_ttl.as_secs(),
                "JWKS cache TTL out of range, entry expires immediately"
            );
            now
        });

        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks { keys, expires_at });

        Ok(())
    }

    async fn fetch(&self) -> Result<JwksResponse, ValidationError> {
        let jwks_url = self.resolve_jwks_url().await?;
        tracing::debug!(target: "authorizer.jwks", url = %jwks_url, "Fetching JWKS");

        self.get_json(jwks_url, "JWKS").await
    }

    async fn resolve_jwks_url(&self) -> Result<&str, ValidationError> {
        match &self.location {
            KeySetLocation::Fixed(url) => Ok(url.as_str()),
            KeySetLocation::Discovered {
                discovery_url,
                jwks_uri,
            } => {
                let uri = jwks_uri
                    .get_or_try_init(|| async {
                        tracing::debug!(target: "authorizer.jwks", url = %discovery_url, "Fetching OIDC discovery document");
                        let document: OpenIdConfiguration =
                            self.get_json(discovery_url, "discovery").await?;
                        tracing::info!(target: "authorizer.jwks", jwks_uri = %document.jwks_uri, "Resolved JWKS location");
                        Ok::<_, ValidationError>(document.jwks_uri)
                    })
                    .await?;
                Ok(uri.as_str())
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        what: &str,
    ) -> Result<T, ValidationError> {
        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!(target: "authorizer.jwks", error = %e, document = what, "Failed to fetch document");
            ValidationError::KeyProviderUnavailable(format!("{} request failed", what))
        })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "authorizer.jwks",
                status = %response.status(),
                document = what,
                "Endpoint returned error"
            );
            return Err(ValidationError::KeyProviderUnavailable(format!(
                "{} endpoint returned {}",
                what,
                response.status()
            )));
        }

        response.json().await.map_err(|e| {
            tracing::error!(target: "authorizer.jwks", error = %e, document = what, "Failed to parse response");
            ValidationError::KeyProviderUnavailable(format!("{} response is malformed", what))
        })
    }

    /// Clear the cache.
    #[cfg(test)]
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }
}

#[async_trait]
impl KeyProvider for JwksClient {
    /// Returns the JWK if found, or fetches from the issuer if cache is expired/empty.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::KeyProviderUnavailable` if JWKS cannot be fetched.
    /// Returns `ValidationError::KeyNotFound` if key ID is not found.
    #[instrument(skip(self), fields(kid = %kid))]
    async fn get_key(&self, kid: &str) -> Result<Jwk, ValidationError> {
        // Check cache first
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    if let Some(key) = cached.keys.get(kid) {
                        tracing::debug!(target: "authorizer.jwks", kid = %kid, "JWKS cache hit");
                        return Ok(key.clone());
                    }
                    tracing::debug!(target: "authorizer.jwks", kid = %kid, "Key not found in JWKS cache");
                    return Err(ValidationError::KeyNotFound(kid.to_string()));
                }
            }
        }

        // Cache miss or expired - fetch fresh JWKS
        self.refresh_cache().await?;

        let cache = self.cache.read().await;
        if let Some(cached) = cache.as_ref() {
            if let Some(key) = cached.keys.get(kid) {
                return Ok(key.clone());
            }
        }

        tracing::warn!(target: "authorizer.jwks", kid = %kid, "Key not found in JWKS after refresh");
        Err(ValidationError::KeyNotFound(kid.to_string()))
    }
}

/// Key provider backed by a fixed key set.
///
/// Used when keys are distributed out of band, and in tests.
pub struct StaticKeyProvider {
    keys: HashMap<String, Jwk>,
}

impl StaticKeyProvider {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self {
            keys: keys.into_iter().map(|key| (key.kid.clone(), key)).collect(),
        }
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn get_key(&self, kid: &str) -> Result<Jwk, ValidationError> {
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| ValidationError::KeyNotFound(kid.to_string()))
    }
}

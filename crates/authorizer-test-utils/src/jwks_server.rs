//! Mocked JWKS endpoint.
//!
//! Wraps a wiremock server publishing a key set at
//! `/.well-known/jwks.json`, the way an OIDC issuer does.

use crate::test_ids::{TEST_AUDIENCE, TEST_DOMAIN};
use std::collections::HashMap;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock serves the key set on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Mock JWKS server.
pub struct TestJwksServer {
    mock_server: MockServer,
}

impl TestJwksServer {
    /// Start a server publishing `keys` (JWK JSON objects).
    pub async fn start(keys: Vec<serde_json::Value>) -> Self {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "keys": keys })),
            )
            .mount(&mock_server)
            .await;

        Self { mock_server }
    }

    /// Start a server whose JWKS endpoint fails with `status`.
    pub async fn start_failing(status: u16) -> Self {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&mock_server)
            .await;

        Self { mock_server }
    }

    /// Full URL of the key set.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.mock_server.uri(), JWKS_PATH)
    }

    /// Number of key set fetches served so far.
    pub async fn fetch_count(&self) -> usize {
        self.mock_server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|request| request.url.path() == JWKS_PATH)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Environment for `Config::from_vars` pointing at this server.
    pub fn config_vars(&self) -> HashMap<String, String> {
        HashMap::from([
            ("AUTH0_DOMAIN".to_string(), TEST_DOMAIN.to_string()),
            ("AUTH0_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
            ("JWKS_URL".to_string(), self.jwks_url()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ])
    }

    pub fn mock_server(&self) -> &MockServer {
        &self.mock_server
    }
}

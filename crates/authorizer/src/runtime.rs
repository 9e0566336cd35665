//! AWS Lambda Runtime API client.
//!
//! Implements the custom-runtime loop over HTTP:
//!
//! ```text
//! GET  /2018-06-01/runtime/invocation/next            -> event + request id
//! POST /2018-06-01/runtime/invocation/{id}/response   <- AuthorizerResponse
//! POST /2018-06-01/runtime/invocation/{id}/error      <- unparseable event
//! POST /2018-06-01/runtime/init/error                 <- startup failure
//! ```
//!
//! Token validation failures are never reported as invocation errors: they
//! are logged and answered with the `Deny` policy.
//!
//! The X-Ray trace header of each invocation is exported as `_X_AMZN_TRACE_ID`
//! before the invocation is handled. Invocations are handled one at a time.

use crate::decision::DecisionEngine;
use crate::errors::AuthorizerError;
use crate::models::AuthorizerRequest;
use serde::Serialize;
use std::sync::Arc;
use tracing::{instrument, Instrument};

/// Runtime API version prefix.
const RUNTIME_API_VERSION: &str = "2018-06-01";

/// Header carrying the invocation's request id.
const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";

/// Header carrying the X-Ray trace header of the invocation.
const TRACE_ID_HEADER: &str = "Lambda-Runtime-Trace-Id";

/// Header carrying the invocation deadline in Unix epoch milliseconds.
const DEADLINE_HEADER: &str = "Lambda-Runtime-Deadline-Ms";

/// Environment variable the AWS SDKs read the current trace header from.
pub const TRACE_ID_ENV_VAR: &str = "_X_AMZN_TRACE_ID";

/// Header carrying the function error type on error reports.
const ERROR_TYPE_HEADER: &str = "Lambda-Runtime-Function-Error-Type";

/// One pending invocation.
#[derive(Debug)]
pub struct Invocation {
    pub request_id: String,
    pub trace_id: Option<String>,
    pub deadline_ms: Option<u64>,
    pub payload: Vec<u8>,
}

/// Error body understood by the Runtime API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorReport<'a> {
    error_message: String,
    error_type: &'a str,
}

/// Lambda custom runtime driving the decision engine.
pub struct LambdaRuntime {
    base_url: String,
    http_client: reqwest::Client,
    engine: Arc<DecisionEngine>,
}

impl LambdaRuntime {
    /// Create a runtime for `runtime_api` (the `AWS_LAMBDA_RUNTIME_API` host:port).
    pub fn new(runtime_api: &str, engine: Arc<DecisionEngine>) -> Self {
        Self {
            base_url: runtime_base_url(runtime_api),
            // No timeout: the next-invocation call long-polls
            http_client: reqwest::Client::new(),
            engine,
        }
    }

    /// Serve invocations until the Runtime API becomes unreachable.
    pub async fn run(&self) -> Result<(), AuthorizerError> {
        tracing::info!(target: "authorizer.runtime", base_url = %self.base_url, "Lambda runtime loop started");

        loop {
            self.process_next().await?;
        }
    }

    /// Fetch, decide and answer a single invocation.
    pub async fn process_next(&self) -> Result<(), AuthorizerError> {
        let invocation = self.next_invocation().await?;
        let span = tracing::info_span!(
            "authorizer.invocation",
            request_id = %invocation.request_id,
            deadline_ms = invocation.deadline_ms,
        );

        if let Some(trace_id) = &invocation.trace_id {
            std::env::set_var(TRACE_ID_ENV_VAR, trace_id);
        }

        self.handle(invocation).instrument(span).await
    }

    async fn handle(&self, invocation: Invocation) -> Result<(), AuthorizerError> {
        let request: AuthorizerRequest = match serde_json::from_slice(&invocation.payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(target: "authorizer.runtime", error = %e, "Invocation payload is not an authorizer event");
                let error = AuthorizerError::BadRequest(format!("invalid authorizer event: {}", e));
                return self.report_invocation_error(&invocation.request_id, &error).await;
            }
        };

        let (response, cause) = self
            .engine
            .decide(&request.authorization_token, &request.method_arn)
            .await
            .into_parts();

        if let Some(cause) = cause {
            tracing::warn!(
                target: "authorizer.runtime",
                reason = cause.kind(),
                error = %cause,
                "Token rejected"
            );
        }

        self.post_json(
            &format!("invocation/{}/response", invocation.request_id),
            &response,
            None,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn next_invocation(&self) -> Result<Invocation, AuthorizerError> {
        let response = self
            .http_client
            .get(self.url("invocation/next"))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "authorizer.runtime", error = %e, "Failed to poll next invocation");
                AuthorizerError::Runtime(format!("next invocation request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AuthorizerError::Runtime(format!(
                "next invocation returned {}",
                response.status()
            )));
        }

        let request_id = header_value(&response, REQUEST_ID_HEADER)
            .map(ToString::to_string)
            .ok_or_else(|| {
                AuthorizerError::Runtime(format!("next invocation missing {}", REQUEST_ID_HEADER))
            })?;

        let trace_id = header_value(&response, TRACE_ID_HEADER).map(ToString::to_string);
        let deadline_ms = header_value(&response, DEADLINE_HEADER).and_then(|v| v.parse().ok());

        let payload = response
            .bytes()
            .await
            .map_err(|e| AuthorizerError::Runtime(format!("failed to read invocation body: {}", e)))?
            .to_vec();

        Ok(Invocation {
            request_id,
            trace_id,
            deadline_ms,
            payload,
        })
    }

    async fn report_invocation_error(
        &self,
        request_id: &str,
        error: &AuthorizerError,
    ) -> Result<(), AuthorizerError> {
        let report = ErrorReport {
            error_message: error.to_string(),
            error_type: error.error_type(),
        };

        self.post_json(
            &format!("invocation/{}/error", request_id),
            &report,
            Some(error.error_type()),
        )
        .await
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        error_type: Option<&str>,
    ) -> Result<(), AuthorizerError> {
        post_json(&self.http_client, &self.url(path), body, error_type).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Report a startup failure to the Runtime API.
///
/// Used when configuration fails before a [`LambdaRuntime`] can be built.
pub async fn report_init_error_to(
    runtime_api: &str,
    error: &AuthorizerError,
) -> Result<(), AuthorizerError> {
    report_init_error(&reqwest::Client::new(), &runtime_base_url(runtime_api), error).await
}

async fn report_init_error(
    client: &reqwest::Client,
    base_url: &str,
    error: &AuthorizerError,
) -> Result<(), AuthorizerError> {
    let report = ErrorReport {
        error_message: error.to_string(),
        error_type: error.error_type(),
    };

    post_json(
        client,
        &format!("{}/init/error", base_url),
        &report,
        Some(error.error_type()),
    )
    .await
}

async fn post_json<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    body: &T,
    error_type: Option<&str>,
) -> Result<(), AuthorizerError> {
    let mut request = client.post(url).json(body);
    if let Some(error_type) = error_type {
        request = request.header(ERROR_TYPE_HEADER, error_type);
    }

    let response = request.send().await.map_err(|e| {
        tracing::error!(target: "authorizer.runtime", error = %e, url = %url, "Runtime API request failed");
        AuthorizerError::Runtime(format!("runtime API request failed: {}", e))
    })?;

    if !response.status().is_success() {
        tracing::error!(
            target: "authorizer.runtime",
            status = %response.status(),
            url = %url,
            "Runtime API rejected request"
        );
        return Err(AuthorizerError::Runtime(format!(
            "runtime API returned {}",
            response.status()
        )));
    }

    Ok(())
}

fn header_value<'a>(response: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

fn runtime_base_url(runtime_api: &str) -> String {
    let host = runtime_api.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}/{}/runtime", host, RUNTIME_API_VERSION)
    } else {
        format!("http://{}/{}/runtime", host, RUNTIME_API_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_base_url_from_host_port() {
        assert_eq!(
            runtime_base_url("127.0.0.1:9001"),
            "http://127.0.0.1:9001/2018-06-01/runtime"
        );
    }

    #[test]
    fn test_runtime_base_url_keeps_scheme() {
        assert_eq!(
            runtime_base_url("http://localhost:9001/"),
            "http://localhost:9001/2018-06-01/runtime"
        );
    }

    #[test]
    fn test_error_report_wire_format() {
        let report = ErrorReport {
            error_message: "boom".to_string(),
            error_type: "Runtime.InvalidEvent",
        };

        assert_eq!(
            serde_json::to_value(&report).ok(),
            Some(serde_json::json!({
                "errorMessage": "boom",
                "errorType": "Runtime.InvalidEvent"
            }))
        );
    }
}

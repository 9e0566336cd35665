//! Authorization policy documents.
//!
//! Builds the IAM-style response the API gateway's policy-enforcement layer
//! consumes:
//!
//! ```json
//! {
//!   "principalId": "user",
//!   "policyDocument": {
//!     "Version": "2012-10-17",
//!     "Statement": [
//!       { "Action": ["execute-api:Invoke"], "Effect": "Allow", "Resource": ["arn:aws:execute-api:..."] }
//!     ]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// IAM policy language version.
pub const POLICY_VERSION: &str = "2012-10-17";

/// The single action every statement grants or denies.
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

/// Principal reported for every decision.
///
/// Not derived from the token subject.
pub const DEFAULT_PRINCIPAL_ID: &str = "user";

/// Policy statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub action: Vec<String>,
    pub effect: Effect,
    pub resource: Vec<String>,
}

/// Policy document attached to an authorizer response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

/// Authorizer response returned to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    pub principal_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_document: Option<PolicyDocument>,
}

impl AuthorizerResponse {
    /// Effect of the (single) statement, if the response carries one.
    pub fn effect(&self) -> Option<Effect> {
        self.policy_document
            .as_ref()
            .and_then(|doc| doc.statement.first())
            .map(|statement| statement.effect)
    }
}

/// Build the authorizer response for `principal_id`.
///
/// With both an effect and a non-empty resource the document carries exactly
/// one statement for [`INVOKE_ACTION`] over that resource. If either is
/// missing the policy document is omitted and only the principal is returned.
pub fn build_policy(
    principal_id: &str,
    effect: Option<Effect>,
    resource: &str,
) -> AuthorizerResponse {
    let policy_document = match effect {
        Some(effect) if !resource.is_empty() => Some(PolicyDocument {
            version: POLICY_VERSION.to_string(),
            statement: vec![Statement {
                action: vec![INVOKE_ACTION.to_string()],
                effect,
                resource: vec![resource.to_string()],
            }],
        }),
        _ => None,
    };

    AuthorizerResponse {
        principal_id: principal_id.to_string(),
        policy_document,
    }
}

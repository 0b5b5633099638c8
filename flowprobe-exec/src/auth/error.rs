use serde_json::json;

use crate::auth::redact::scrub_json;

/// Authentication failures. Each variant has a stable numeric code for reporting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no token stored for namespace `{namespace}`")]
    TokenMissing { namespace: String },
    #[error("token for namespace `{namespace}` has expired")]
    TokenExpired { namespace: String },
    #[error("no token found in response at path `{path}`")]
    ExtractionPathNotFound { path: String },
    #[error("environment variable `{var}` is not set (static token for namespace `{namespace}`)")]
    EnvVarNotSet { var: String, namespace: String },
    #[error("invalid auth configuration: {message}")]
    InvalidConfig { message: String },
    #[error("login auth on step `{step}` needs the response of the request")]
    ResponseRequired { step: String },
}

impl AuthError {
    pub fn code(&self) -> u16 {
        match self {
            AuthError::TokenMissing { .. } => 1001,
            AuthError::TokenExpired { .. } => 1002,
            AuthError::ExtractionPathNotFound { .. } => 1003,
            AuthError::EnvVarNotSet { .. } => 1004,
            AuthError::InvalidConfig { .. } => 1005,
            AuthError::ResponseRequired { .. } => 1006,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::TokenMissing { .. } => "token_missing",
            AuthError::TokenExpired { .. } => "token_expired",
            AuthError::ExtractionPathNotFound { .. } => "extraction_path_not_found",
            AuthError::EnvVarNotSet { .. } => "env_var_not_set",
            AuthError::InvalidConfig { .. } => "invalid_config",
            AuthError::ResponseRequired { .. } => "response_required",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            AuthError::TokenMissing { .. } => {
                "run a login step for this namespace first or declare it under globals.auth.static"
            }
            AuthError::TokenExpired { .. } => {
                "re-run the login step or raise expiresIn for this namespace"
            }
            AuthError::ExtractionPathNotFound { .. } => {
                "check tokenPath against the login response body, e.g. data.tokens[0].value"
            }
            AuthError::EnvVarNotSet { .. } => "export the variable before starting the flow",
            AuthError::InvalidConfig { .. } => "fix the auth block of the flow definition",
            AuthError::ResponseRequired { .. } => {
                "login auth is resolved after the request; the response was missing"
            }
        }
    }

    /// Serializable form with token-like fields scrubbed.
    pub fn to_json(&self) -> serde_json::Value {
        let mut v = json!({
            "code": self.code(),
            "kind": self.kind(),
            "message": self.to_string(),
            "hint": self.hint(),
        });
        scrub_json(&mut v);
        v
    }
}

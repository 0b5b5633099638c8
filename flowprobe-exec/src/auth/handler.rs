use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use flowprobe_core::types::{FlowStep, StaticTokenDecl, StepAuth};
use flowprobe_core::{env_reference, FieldPath};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::redact::mask_token;
use crate::auth::store::{TokenInfo, TokenState, TokenStore};

/// Where `${VAR}` token references are looked up.
pub trait EnvSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Resolves step auth requirements against a [`TokenStore`] it owns.
pub struct AuthHandler {
    store: TokenStore,
    env: Box<dyn EnvSource>,
}

impl Default for AuthHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AuthHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHandler").field("store", &self.store).finish_non_exhaustive()
    }
}

impl AuthHandler {
    pub fn new() -> Self {
        Self::with_env(ProcessEnv)
    }

    pub fn with_env(env: impl EnvSource + 'static) -> Self {
        Self {
            store: TokenStore::new(),
            env: Box::new(env),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TokenStore {
        &mut self.store
    }

    /// Loads every `globals.auth.static` entry.
    ///
    /// All values are resolved before any is stored, so a missing variable leaves the
    /// store untouched. Returns the namespaces that were loaded.
    pub fn load_static_tokens(
        &mut self,
        decls: &BTreeMap<String, StaticTokenDecl>,
    ) -> Result<Vec<String>, AuthError> {
        let mut resolved = Vec::with_capacity(decls.len());
        for (namespace, decl) in decls {
            let value = self.resolve_static_value(namespace, decl.raw_value())?;
            resolved.push((namespace, value, decl.expires_in()));
        }

        let mut loaded = Vec::with_capacity(resolved.len());
        for (namespace, value, expires_in) in resolved {
            tracing::info!(namespace = %namespace, token = %mask_token(&value), "loaded static token");
            self.store
                .set_token_with_ttl(value, namespace, expires_in.map(Duration::from_secs));
            loaded.push(namespace.clone());
        }
        Ok(loaded)
    }

    /// Expands a single `${VAR}` reference. The expanded value is never expanded again.
    pub fn resolve_static_value(&self, namespace: &str, raw: &str) -> Result<String, AuthError> {
        let value = match env_reference(raw) {
            Some(var) => self.env.var(var).ok_or_else(|| AuthError::EnvVarNotSet {
                var: var.to_string(),
                namespace: namespace.to_string(),
            })?,
            None => raw.to_string(),
        };
        if value.is_empty() {
            return Err(AuthError::InvalidConfig {
                message: format!("static token for namespace `{namespace}` is empty"),
            });
        }
        Ok(value)
    }

    /// Resolves the auth requirement of `step`.
    ///
    /// `static` auth checks the store before the request; `login` auth extracts a token
    /// from `response` (the parsed body) after it. Steps without auth always succeed.
    pub fn handle_step_auth(
        &mut self,
        step: &FlowStep,
        response: Option<&JsonValue>,
        execution_id: Option<Uuid>,
    ) -> Result<(), AuthError> {
        let Some(auth) = &step.auth else {
            return Ok(());
        };
        let execution_id = execution_id.unwrap_or_default();

        match auth {
            StepAuth::Static { namespace } => match self.store.token_state(namespace) {
                TokenState::Valid => Ok(()),
                TokenState::Expired => {
                    self.store.remove_token(namespace);
                    Err(AuthError::TokenExpired {
                        namespace: namespace.clone(),
                    })
                }
                TokenState::Missing => Err(AuthError::TokenMissing {
                    namespace: namespace.clone(),
                }),
            },
            StepAuth::Login {
                token_path,
                namespace,
                expires_in,
            } => {
                let body = response.ok_or_else(|| AuthError::ResponseRequired {
                    step: step.name.clone(),
                })?;
                let token = extract_token(body, token_path)?;
                tracing::info!(
                    %execution_id,
                    step = %step.name,
                    namespace = %namespace,
                    token = %mask_token(&token),
                    "stored token from login response"
                );
                self.store
                    .set_token_with_ttl(token, namespace, expires_in.map(Duration::from_secs));
                Ok(())
            }
        }
    }

    /// Sets `Authorization: Bearer <token>` when `namespace` has a live token.
    ///
    /// An existing authorization header (any casing) is replaced. Headers pass through
    /// unchanged when no token is available.
    pub fn inject_auth_header(
        &mut self,
        mut headers: BTreeMap<String, String>,
        namespace: &str,
    ) -> BTreeMap<String, String> {
        let Some(token) = self.store.get_token(namespace) else {
            return headers;
        };
        headers.retain(|k, _| !k.eq_ignore_ascii_case("authorization"));
        headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        headers
    }

    pub fn get_all_tokens_status(&mut self) -> Vec<TokenInfo> {
        self.store.get_all_tokens_info()
    }

    pub fn clear_all_tokens(&mut self) {
        self.store.clear_all_tokens();
    }
}

/// Reads a token out of `body` at `path`, e.g. `data.tokens[0].value`.
///
/// Strings are taken as is and other scalars use their JSON text. `null`, a missing
/// path or an empty string fail with the path in the error.
pub fn extract_token(body: &JsonValue, path: &str) -> Result<String, AuthError> {
    let parsed = FieldPath::parse(path).map_err(|e| AuthError::InvalidConfig {
        message: format!("invalid tokenPath: {e}"),
    })?;
    let not_found = || AuthError::ExtractionPathNotFound {
        path: path.to_string(),
    };
    match parsed.resolve(body) {
        None | Some(JsonValue::Null) => Err(not_found()),
        Some(JsonValue::String(s)) if s.is_empty() => Err(not_found()),
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(v @ (JsonValue::Number(_) | JsonValue::Bool(_))) => Ok(v.to_string()),
        Some(_) => Err(AuthError::InvalidConfig {
            message: format!("value at tokenPath `{path}` is not a scalar"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_through_array_index() {
        let body = json!({ "data": { "tokens": [ { "value": "abc" } ] } });
        assert_eq!(extract_token(&body, "data.tokens[0].value").unwrap(), "abc");
    }

    #[test]
    fn null_extraction_names_the_path() {
        let body = json!({ "data": { "token": null } });
        let err = extract_token(&body, "data.token").unwrap_err();
        assert_eq!(
            err,
            AuthError::ExtractionPathNotFound {
                path: "data.token".to_string()
            }
        );
        assert!(err.to_string().contains("data.token"));
    }

    #[test]
    fn malformed_path_is_a_config_error() {
        let err = extract_token(&json!({}), "data..token").unwrap_err();
        assert_eq!(err.code(), 1005);
    }

    #[test]
    fn inject_replaces_existing_authorization() {
        let mut handler = AuthHandler::with_env(BTreeMap::new());
        handler.store_mut().set_token("tok", "api", None);
        let mut headers = BTreeMap::new();
        headers.insert("authorization".to_string(), "Basic xyz".to_string());
        let out = handler.inject_auth_header(headers, "api");
        assert_eq!(out.len(), 1);
        assert_eq!(out["Authorization"], "Bearer tok");
    }

    #[test]
    fn inject_without_token_is_passthrough() {
        let mut handler = AuthHandler::with_env(BTreeMap::new());
        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        let out = handler.inject_auth_header(headers.clone(), "api");
        assert_eq!(out, headers);
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use crate::auth::redact::mask_token;

struct StoredToken {
    value: SecretString,
    expires_at: Option<Instant>,
}

impl StoredToken {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Valid,
    Expired,
    Missing,
}

/// Diagnostic view of a stored token. Never carries the clear-text value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub namespace: String,
    pub masked_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_ms: Option<u64>,
}

/// Namespaced bearer tokens for one orchestrator.
///
/// Expiry is checked lazily: an expired entry stays in the map until the next read
/// of that namespace evicts it. There is no internal locking; mutation goes through
/// `&mut self`.
#[derive(Default)]
pub struct TokenStore {
    tokens: BTreeMap<String, StoredToken>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `namespace`, replacing whatever was there.
    pub fn set_token(&mut self, value: impl Into<String>, namespace: &str, expires_at: Option<Instant>) {
        self.tokens.insert(
            namespace.to_string(),
            StoredToken {
                value: SecretString::from(value.into()),
                expires_at,
            },
        );
    }

    pub fn set_token_with_ttl(&mut self, value: impl Into<String>, namespace: &str, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.set_token(value, namespace, expires_at);
    }

    pub fn get_token(&mut self, namespace: &str) -> Option<String> {
        let now = Instant::now();
        let expired = self.tokens.get(namespace)?.is_expired(now);
        if expired {
            self.tokens.remove(namespace);
            tracing::debug!(namespace, "evicted expired token");
            return None;
        }
        self.tokens
            .get(namespace)
            .map(|t| t.value.expose_secret().to_string())
    }

    pub fn has_valid_token(&mut self, namespace: &str) -> bool {
        self.get_token(namespace).is_some()
    }

    /// Non-evicting peek, used to tell an expired token apart from a missing one.
    pub fn token_state(&self, namespace: &str) -> TokenState {
        match self.tokens.get(namespace) {
            None => TokenState::Missing,
            Some(t) if t.is_expired(Instant::now()) => TokenState::Expired,
            Some(_) => TokenState::Valid,
        }
    }

    pub fn remove_token(&mut self, namespace: &str) -> bool {
        self.tokens.remove(namespace).is_some()
    }

    pub fn clear_all_tokens(&mut self) {
        self.tokens.clear();
    }

    /// Live tokens only; expired entries found here are evicted like any other read.
    pub fn get_all_tokens_info(&mut self) -> Vec<TokenInfo> {
        let now = Instant::now();
        self.tokens.retain(|_, t| !t.is_expired(now));
        self.tokens
            .iter()
            .map(|(namespace, t)| TokenInfo {
                namespace: namespace.clone(),
                masked_value: mask_token(t.value.expose_secret()),
                expires_in_ms: t
                    .expires_at
                    .map(|at| at.saturating_duration_since(now).as_millis() as u64),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("namespaces", &self.tokens.keys().collect::<Vec<_>>())
            .finish()
    }
}

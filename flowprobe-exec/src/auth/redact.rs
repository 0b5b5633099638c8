use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

pub const REDACTED: &str = "<redacted>";

const TOKEN_LIKE_KEYS: &[&str] = &[
    "token",
    "access_token",
    "accesstoken",
    "refresh_token",
    "refreshtoken",
    "id_token",
    "authorization",
    "password",
    "secret",
    "client_secret",
    "api_key",
    "apikey",
];

#[derive(Debug, Clone)]
pub struct SensitiveHeadersConfig {
    /// Lowercased header names that must always be redacted.
    pub always_redact: Vec<String>,
}

impl Default for SensitiveHeadersConfig {
    fn default() -> Self {
        Self {
            always_redact: vec![
                "authorization".to_string(),
                "cookie".to_string(),
                "set-cookie".to_string(),
                "proxy-authorization".to_string(),
            ],
        }
    }
}

/// Masked form of a token for logs and diagnostics.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    format!("{head}****")
}

pub fn redact_headers(
    headers: &BTreeMap<String, String>,
    sensitive: &SensitiveHeadersConfig,
) -> BTreeMap<String, String> {
    let mut out = headers.clone();
    for name in &sensitive.always_redact {
        let keys = out
            .keys()
            .filter(|k| k.eq_ignore_ascii_case(name))
            .cloned()
            .collect::<Vec<_>>();
        for k in keys {
            out.insert(k, REDACTED.to_string());
        }
    }
    out
}

/// Replaces the values of token-like keys anywhere in `value`.
pub fn scrub_json(value: &mut JsonValue) {
    match value {
        JsonValue::Object(map) => {
            for (k, v) in map.iter_mut() {
                if is_token_like(k) && !v.is_null() {
                    *v = JsonValue::String(REDACTED.to_string());
                } else {
                    scrub_json(v);
                }
            }
        }
        JsonValue::Array(items) => items.iter_mut().for_each(scrub_json),
        _ => {}
    }
}

fn is_token_like(key: &str) -> bool {
    let key = key.to_ascii_lowercase().replace('-', "_");
    TOKEN_LIKE_KEYS.iter().any(|k| *k == key)
}

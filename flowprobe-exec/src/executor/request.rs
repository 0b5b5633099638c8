use std::collections::BTreeMap;
use std::time::Duration;

use flowprobe_core::types::{FlowDefinition, FlowStep};
use serde_json::Value as JsonValue;

use crate::executor::http::HttpRequest;
use crate::executor::types::ExecutorConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestBuildError {
    #[error("step url `{url}` is relative and the flow has no baseUrl")]
    MissingBaseUrl { url: String },
    #[error("invalid url `{url}`: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("failed to serialize request body: {0}")]
    Body(String),
}

/// Builds the concrete request of `step` within `flow`.
pub fn build_request(
    flow: &FlowDefinition,
    step: &FlowStep,
    cfg: &ExecutorConfig,
) -> Result<HttpRequest, RequestBuildError> {
    let req = &step.request;
    let mut url = resolve_url(flow.base_url(), &req.url)?;
    if !req.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in &req.query {
            match v {
                JsonValue::Array(items) => {
                    for item in items {
                        pairs.append_pair(k, &value_to_string(item));
                    }
                }
                JsonValue::Null => {}
                other => {
                    pairs.append_pair(k, &value_to_string(other));
                }
            }
        }
    }

    let mut headers = BTreeMap::<String, String>::new();
    if let Some(globals) = &flow.globals {
        for (k, v) in &globals.headers {
            set_header(&mut headers, k, v);
        }
    }
    for (k, v) in &req.headers {
        set_header(&mut headers, k, v);
    }

    let body = match &req.body {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::String(text)) => {
            set_default_header(&mut headers, "Content-Type", "text/plain; charset=utf-8");
            text.as_bytes().to_vec()
        }
        Some(value) => {
            set_default_header(&mut headers, "Content-Type", "application/json");
            serde_json::to_vec(value).map_err(|e| RequestBuildError::Body(e.to_string()))?
        }
    };

    let timeout_ms = req
        .timeout_ms
        .or_else(|| flow.globals.as_ref().and_then(|g| g.timeout_ms));
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(cfg.request_timeout);

    Ok(HttpRequest {
        method: req.method.to_ascii_uppercase(),
        url,
        headers,
        body,
        timeout,
    })
}

fn resolve_url(base_url: Option<&str>, raw: &str) -> Result<url::Url, RequestBuildError> {
    let invalid = |e: url::ParseError| RequestBuildError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    };
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return url::Url::parse(raw).map_err(invalid);
    }
    let Some(base) = base_url else {
        return Err(RequestBuildError::MissingBaseUrl {
            url: raw.to_string(),
        });
    };
    let joined = if raw.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), raw.trim_start_matches('/'))
    };
    url::Url::parse(&joined).map_err(invalid)
}

/// Inserts `name`, replacing any header that differs only in case.
fn set_header(headers: &mut BTreeMap<String, String>, name: &str, value: &str) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.to_string());
}

fn set_default_header(headers: &mut BTreeMap<String, String>, name: &str, value: &str) {
    if !headers.keys().any(|k| k.eq_ignore_ascii_case(name)) {
        headers.insert(name.to_string(), value.to_string());
    }
}

fn value_to_string(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

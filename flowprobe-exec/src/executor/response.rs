use serde_json::Value as JsonValue;

use crate::auth::{redact_headers, scrub_json, SensitiveHeadersConfig};
use crate::executor::http::HttpResponse;
use crate::executor::result::StepResponse;

pub fn parse_body_json(resp: &HttpResponse) -> Option<JsonValue> {
    let s = std::str::from_utf8(&resp.body).ok()?;
    serde_json::from_str(s).ok()
}

/// The response as recorded on a `TestResult`: sensitive headers and token-like body
/// fields redacted, JSON bodies parsed and other bodies kept as text.
pub fn to_step_response(resp: &HttpResponse, sensitive: &SensitiveHeadersConfig) -> StepResponse {
    let body = match parse_body_json(resp) {
        Some(mut v) => {
            scrub_json(&mut v);
            v
        }
        None if resp.body.is_empty() => JsonValue::Null,
        None => JsonValue::String(String::from_utf8_lossy(&resp.body).into_owned()),
    };
    StepResponse {
        status: resp.status,
        headers: redact_headers(&resp.headers, sensitive),
        body,
        duration: resp.duration,
    }
}

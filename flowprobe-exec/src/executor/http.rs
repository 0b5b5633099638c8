use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::retry::Retryable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: url::Url,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub duration: Duration,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("request timed out")]
    Timeout,
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    #[error("dns lookup failed: {0}")]
    Dns(String),
    #[error("connection error: {0}")]
    Network(String),
    #[error("response too large (>{max_bytes} bytes)")]
    ResponseTooLarge { max_bytes: usize },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("http error: {0}")]
    Other(String),
}

impl HttpError {
    /// Symbolic error code, in the style of socket errnos.
    pub fn code(&self) -> &'static str {
        match self {
            HttpError::Timeout => "ETIMEDOUT",
            HttpError::ConnectionRefused(_) => "ECONNREFUSED",
            HttpError::Dns(_) => "ENOTFOUND",
            HttpError::Network(_) => "ECONNRESET",
            HttpError::ResponseTooLarge { .. } => "ERESPONSETOOLARGE",
            HttpError::InvalidRequest(_) => "EINVALIDREQUEST",
            HttpError::Other(_) => "EUNKNOWN",
        }
    }
}

impl Retryable for HttpError {
    fn error_code(&self) -> Option<&str> {
        Some(self.code())
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, HttpError>;
}

pub struct ReqwestHttpClient {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl ReqwestHttpClient {
    pub fn new(max_response_bytes: usize) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("flowprobe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Other(format!("failed to build http client: {e}")))?;
        Ok(Self::from_client(client, max_response_bytes))
    }

    pub fn from_client(client: reqwest::Client, max_response_bytes: usize) -> Self {
        Self {
            client,
            max_response_bytes,
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method: reqwest::Method = req
            .method
            .to_ascii_uppercase()
            .parse()
            .map_err(|e: <reqwest::Method as std::str::FromStr>::Err| {
                HttpError::InvalidRequest(e.to_string())
            })?;
        let started = Instant::now();
        let mut rb = self.client.request(method, req.url).timeout(req.timeout);

        for (k, v) in req.headers {
            rb = rb.header(k, v);
        }
        if !req.body.is_empty() {
            rb = rb.body(req.body);
        }

        let resp = rb.send().await.map_err(map_reqwest_error)?;
        let status = resp.status().as_u16();

        let mut headers = BTreeMap::new();
        for (k, v) in resp.headers().iter() {
            if let Ok(s) = v.to_str() {
                headers.insert(k.to_string(), s.to_string());
            }
        }

        if resp
            .content_length()
            .is_some_and(|len| len as usize > self.max_response_bytes)
        {
            return Err(HttpError::ResponseTooLarge {
                max_bytes: self.max_response_bytes,
            });
        }
        let body = resp.bytes().await.map_err(map_reqwest_error)?;
        if body.len() > self.max_response_bytes {
            return Err(HttpError::ResponseTooLarge {
                max_bytes: self.max_response_bytes,
            });
        }

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
            duration: started.elapsed(),
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        return HttpError::Timeout;
    }
    if e.is_builder() {
        return HttpError::InvalidRequest(e.to_string());
    }
    if e.is_connect() {
        let detail = error_chain(&e);
        let lower = detail.to_ascii_lowercase();
        if lower.contains("dns error") || lower.contains("failed to lookup address") {
            return HttpError::Dns(detail);
        }
        if lower.contains("connection refused") {
            return HttpError::ConnectionRefused(detail);
        }
        return HttpError::Network(detail);
    }
    if e.is_request() || e.is_body() {
        return HttpError::Network(error_chain(&e));
    }
    HttpError::Other(e.to_string())
}

fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut out = e.to_string();
    let mut cur = e.source();
    while let Some(src) = cur {
        out.push_str(": ");
        out.push_str(&src.to_string());
        cur = src.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::is_retryable;

    #[test]
    fn transport_codes_drive_retryability() {
        assert!(is_retryable(&HttpError::Timeout));
        assert!(is_retryable(&HttpError::ConnectionRefused("x".into())));
        assert!(is_retryable(&HttpError::Dns("x".into())));
        assert!(is_retryable(&HttpError::Network("reset".into())));
        assert!(!is_retryable(&HttpError::ResponseTooLarge { max_bytes: 1 }));
        assert!(!is_retryable(&HttpError::InvalidRequest("bad".into())));
    }
}

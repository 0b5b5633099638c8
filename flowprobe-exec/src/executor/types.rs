use std::time::Duration;

use uuid::Uuid;

use crate::auth::SensitiveHeadersConfig;
use crate::retry::{CircuitBreakerConfig, RetryConfig};

pub const ENV_RETRIES: &str = "FLOWPROBE_RETRIES";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "FLOWPROBE_RETRY_BASE_DELAY_MS";
pub const ENV_RETRY_MAX_DELAY_MS: &str = "FLOWPROBE_RETRY_MAX_DELAY_MS";
pub const ENV_CB_FAILURE_THRESHOLD: &str = "FLOWPROBE_CB_FAILURE_THRESHOLD";
pub const ENV_CB_RECOVERY_TIMEOUT_MS: &str = "FLOWPROBE_CB_RECOVERY_TIMEOUT_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "FLOWPROBE_REQUEST_TIMEOUT_MS";

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub request_timeout: Duration,
    pub max_response_bytes: usize,
    pub sensitive_headers: SensitiveHeadersConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            request_timeout: Duration::from_secs(30),
            max_response_bytes: 4 * 1024 * 1024,
            sensitive_headers: SensitiveHeadersConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value for {var}: `{value}`")]
pub struct ConfigError {
    pub var: String,
    pub value: String,
}

impl ExecutorConfig {
    /// Defaults overridden by `FLOWPROBE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(v) = parse_var::<u32>(&lookup, ENV_RETRIES)? {
            cfg.retry.retries = v;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_RETRY_BASE_DELAY_MS)? {
            cfg.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_RETRY_MAX_DELAY_MS)? {
            cfg.retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(v) = parse_var::<u32>(&lookup, ENV_CB_FAILURE_THRESHOLD)? {
            cfg.circuit_breaker.failure_threshold = v.max(1);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_CB_RECOVERY_TIMEOUT_MS)? {
            cfg.circuit_breaker.recovery_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_REQUEST_TIMEOUT_MS)? {
            cfg.request_timeout = Duration::from_millis(ms);
        }
        Ok(cfg)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<T>().map(Some).map_err(|_| ConfigError {
        var: var.to_string(),
        value: raw.clone(),
    })
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Correlation id for events and logs; a fresh v4 id when absent.
    pub execution_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn env_overrides_defaults() {
        let vars: BTreeMap<&str, &str> = [
            (ENV_RETRIES, "1"),
            (ENV_RETRY_BASE_DELAY_MS, "10"),
            (ENV_CB_FAILURE_THRESHOLD, "0"),
            (ENV_REQUEST_TIMEOUT_MS, " "),
        ]
        .into_iter()
        .collect();
        let cfg = ExecutorConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.retry.retries, 1);
        assert_eq!(cfg.retry.base_delay, Duration::from_millis(10));
        assert_eq!(cfg.circuit_breaker.failure_threshold, 1);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn unparsable_value_names_the_variable() {
        let err = ExecutorConfig::from_lookup(|k| (k == ENV_RETRIES).then(|| "many".to_string()))
            .unwrap_err();
        assert_eq!(err.var, ENV_RETRIES);
    }
}

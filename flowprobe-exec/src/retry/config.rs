use std::time::Duration;

use flowprobe_core::types::{CircuitBreakerPolicy, RetryPolicy};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts after the first one.
    pub retries: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_millis(1000),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Overlays the fields `policy` sets; the rest stay as they are.
    pub fn with_policy(&self, policy: &RetryPolicy) -> RetryConfig {
        let mut out = self.clone();
        if let Some(r) = policy.retries {
            out.retries = r;
        }
        if let Some(ms) = policy.base_delay_ms {
            out.base_delay = Duration::from_millis(ms);
        }
        if let Some(f) = policy.factor {
            if f.is_finite() && f > 0.0 {
                out.factor = f;
            }
        }
        if let Some(ms) = policy.max_delay_ms {
            out.max_delay = Duration::from_millis(ms);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_policy(&self, policy: &CircuitBreakerPolicy) -> CircuitBreakerConfig {
        let mut out = self.clone();
        if let Some(t) = policy.failure_threshold {
            out.failure_threshold = t.max(1);
        }
        if let Some(ms) = policy.recovery_timeout_ms {
            out.recovery_timeout = Duration::from_millis(ms);
        }
        out
    }
}

/// Delay before retry number `attempt_index + 1`: `min(base * factor^attempt_index, max)`.
pub fn backoff_delay(cfg: &RetryConfig, attempt_index: u32) -> Duration {
    let exp = attempt_index.min(i32::MAX as u32) as i32;
    let raw = (cfg.base_delay.as_millis() as f64) * cfg.factor.powi(exp);
    let max_ms = cfg.max_delay.as_millis() as f64;
    let ms = if raw.is_finite() { raw.min(max_ms) } else { max_ms };
    Duration::from_millis(ms.max(0.0) as u64)
}

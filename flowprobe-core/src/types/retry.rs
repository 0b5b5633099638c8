/// Partial retry settings. Unset fields inherit from the next layer out
/// (step -> flow globals -> executor config).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "baseDelayMs")]
    pub base_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "maxDelayMs")]
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CircuitBreakerPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "failureThreshold")]
    pub failure_threshold: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "recoveryTimeoutMs")]
    pub recovery_timeout_ms: Option<u64>,
}

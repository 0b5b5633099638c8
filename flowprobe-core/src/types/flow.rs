use std::collections::BTreeMap;

use crate::types::{CircuitBreakerPolicy, FlowStep, GlobalAuth, Headers, RetryPolicy};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FlowDefinition {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub steps: Vec<FlowStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub globals: Option<FlowGlobals>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<FlowOptions>,
}

impl FlowDefinition {
    pub fn fail_fast(&self) -> bool {
        self.options.as_ref().map(|o| o.fail_fast).unwrap_or(false)
    }

    pub fn base_url(&self) -> Option<&str> {
        self.globals.as_ref().and_then(|g| g.base_url.as_deref())
    }

    pub fn step(&self, name: &str) -> Option<&FlowStep> {
        self.steps.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FlowGlobals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: Headers,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<GlobalAuth>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "circuitBreaker")]
    pub circuit_breaker: Option<CircuitBreakerPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "timeoutMs")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FlowOptions {
    #[serde(default)]
    #[serde(rename = "failFast")]
    pub fail_fast: bool,
}

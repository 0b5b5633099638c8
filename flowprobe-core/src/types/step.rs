use std::collections::BTreeMap;

use crate::types::{AnyValue, Headers, RetryPolicy, StepAuth};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FlowStep {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub request: StepRequest,

    #[serde(default)]
    pub expectations: Expectations,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<StepAuth>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StepRequest {
    pub method: String,

    /// Absolute URL, or a path joined onto the flow's base URL.
    pub url: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: Headers,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, AnyValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<AnyValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "timeoutMs")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Expectations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Name of a schema in the caller-supplied registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Partial expected body: every key here must match, extra keys in the response are fine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<AnyValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom: Vec<CustomRule>,
}

impl Expectations {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.schema.is_none() && self.body.is_none() && self.custom.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CustomRule {
    /// Dot/index path into the response body, e.g. `data.items[0].id`.
    pub field: String,

    pub rule: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AnyValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<RuleSeverity>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    #[default]
    Error,
    Warning,
}

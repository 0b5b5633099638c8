use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::auth::AuthError;
use crate::validate::ValidationOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    /// Not produced by the orchestrator; hosts use it to pre-populate result lists.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub has_auth: bool,
    pub auth_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_error_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl AuthStatus {
    pub fn succeeded(namespace: &str) -> Self {
        Self {
            has_auth: true,
            auth_success: true,
            auth_error: None,
            auth_error_code: None,
            namespace: Some(namespace.to_string()),
        }
    }

    pub fn failed(namespace: &str, err: &AuthError) -> Self {
        Self {
            has_auth: true,
            auth_success: false,
            auth_error: Some(err.to_string()),
            auth_error_code: Some(err.code()),
            namespace: Some(namespace.to_string()),
        }
    }

    /// Login auth that never got a response to extract from.
    pub fn not_attempted(namespace: &str, reason: impl Into<String>) -> Self {
        Self {
            has_auth: true,
            auth_success: false,
            auth_error: Some(reason.into()),
            auth_error_code: None,
            namespace: Some(namespace.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: JsonValue,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub step: String,
    pub status: TestStatus,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<StepResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_status: Option<AuthStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationOutcome>,
    /// Transport attempts made, 0 when no request was sent.
    pub attempts: u32,
}

impl TestResult {
    pub fn pending(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status: TestStatus::Pending,
            duration: Duration::ZERO,
            response: None,
            error: None,
            auth_status: None,
            validation: None,
            attempts: 0,
        }
    }

    pub fn failed(step: impl Into<String>, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Failed,
            duration,
            error: Some(error.into()),
            ..Self::pending(step)
        }
    }

    pub fn with_auth_status(mut self, auth_status: AuthStatus) -> Self {
        self.auth_status = Some(auth_status);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == TestStatus::Failed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pending: usize,
    /// Fewer results than steps: a fail-fast stop.
    pub aborted: bool,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult], declared_steps: usize) -> Self {
        let mut s = RunSummary {
            total: results.len(),
            aborted: results.len() < declared_steps,
            ..Default::default()
        };
        for r in results {
            match r.status {
                TestStatus::Passed => s.passed += 1,
                TestStatus::Failed => s.failed += 1,
                TestStatus::Pending => s.pending += 1,
            }
        }
        s
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.pending == 0 && !self.aborted
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to load static auth tokens: {0}")]
    StaticAuth(#[from] AuthError),
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

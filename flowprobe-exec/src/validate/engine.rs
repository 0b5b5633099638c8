use serde::Serialize;

use crate::validate::body::StructuralBodyValidator;
use crate::validate::context::{ValidationContext, ValidationInput};
use crate::validate::issue::{IssueCategory, Severity, ValidationIssue};
use crate::validate::rules::{CustomRuleValidator, RuleHandler, RuleRegistry};
use crate::validate::schema::SchemaValidator;
use crate::validate::status::StatusValidator;
use crate::validate::ResponseValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleCheck {
    pub field: String,
    pub rule: String,
    pub passed: bool,
}

/// Pass/fail per check; `None` when the check did not apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom: Vec<RuleCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub status: OutcomeStatus,
    pub issues: Vec<ValidationIssue>,
    pub patch: ValidationPatch,
}

impl ValidationOutcome {
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    pub fn issues_for(&self, category: IssueCategory) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::Error).count()
    }

    /// One-line description for a failed step.
    pub fn summary(&self) -> Option<String> {
        let first = self.issues.first()?;
        Some(if self.issues.len() == 1 {
            format!("validation failed: {}", first.message)
        } else {
            format!(
                "validation failed with {} issues; first: {}",
                self.issues.len(),
                first.message
            )
        })
    }
}

/// Runs the status, schema, body and custom-rule validators in that order.
///
/// Every validator whose expectation is present runs; issues are concatenated in run
/// order. Any issue, of either severity, fails the outcome.
#[derive(Default)]
pub struct ValidationEngine {
    status: StatusValidator,
    schema: SchemaValidator,
    body: StructuralBodyValidator,
    custom: CustomRuleValidator,
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(registry: RuleRegistry) -> Self {
        Self {
            custom: CustomRuleValidator::new(registry),
            ..Self::default()
        }
    }

    pub fn register_rule(&mut self, name: impl Into<String>, handler: impl RuleHandler + 'static) {
        self.custom.registry_mut().register(name, handler);
    }

    pub fn rules(&self) -> &RuleRegistry {
        self.custom.registry()
    }

    pub fn clear_schema_cache(&self) {
        self.schema.clear_cache();
    }

    /// Compiled schemas are reused across calls while the registry entry under the same
    /// name is unchanged; a different schema under a reused name is compiled afresh.
    pub fn validate_response(&self, input: &ValidationInput<'_>) -> ValidationOutcome {
        let ctx = ValidationContext::from_input(input);
        let expectations = input.expectations;
        let mut patch = ValidationPatch::default();
        let mut issues = Vec::new();

        let status_issues = self.status.validate(&ctx);
        if expectations.status.is_some() {
            patch.status = Some(status_issues.is_empty());
        }
        issues.extend(status_issues);

        let schema_issues = self.schema.validate(&ctx);
        if expectations.schema.is_some() {
            patch.schema = Some(schema_issues.is_empty());
        }
        issues.extend(schema_issues);

        let body_issues = self.body.validate(&ctx);
        if expectations.body.is_some() {
            patch.body = Some(body_issues.is_empty());
        }
        issues.extend(body_issues);

        for (check, issue) in self.custom.evaluate_rules(&ctx) {
            patch.custom.push(check);
            issues.extend(issue);
        }

        let status = if issues.is_empty() {
            OutcomeStatus::Success
        } else {
            OutcomeStatus::Failed
        };
        if status == OutcomeStatus::Failed {
            tracing::debug!(step = ctx.step_name, issues = issues.len(), "response validation failed");
        }
        ValidationOutcome { status, issues, patch }
    }
}

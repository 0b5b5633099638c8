use serde_json::json;

use crate::validate::context::ValidationContext;
use crate::validate::issue::{rule_names, IssueCategory, ValidationIssue};
use crate::validate::ResponseValidator;

/// Exact match on `expectations.status`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusValidator;

impl ResponseValidator for StatusValidator {
    fn category(&self) -> IssueCategory {
        IssueCategory::Status
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        let Some(expected) = ctx.expectations.status else {
            return Vec::new();
        };
        if ctx.status == expected {
            return Vec::new();
        }
        vec![ValidationIssue::error(
            IssueCategory::Status,
            rule_names::STATUS_CODE_MISMATCH,
            format!("expected status {expected}, got {}", ctx.status),
        )
        .with_expected(json!(expected))
        .with_actual(json!(ctx.status))]
    }
}

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    Status,
    Schema,
    Body,
    Custom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

/// Stable rule names carried by issues.
pub mod rule_names {
    pub const STATUS_CODE_MISMATCH: &str = "status-code-mismatch";

    pub const SCHEMA_NOT_FOUND: &str = "schema-not-found";
    pub const SCHEMA_COMPILE_FAILURE: &str = "schema-compile-failure";
    pub const SCHEMA_BODY_NOT_JSON: &str = "schema-body-not-json";
    pub const SCHEMA_VIOLATION: &str = "schema-violation";
    pub const SCHEMA_NOT_NULL: &str = "schema-not-null";
    pub const SCHEMA_CONTAINS: &str = "schema-contains";
    pub const SCHEMA_REGEX: &str = "schema-regex";

    pub const BODY_MISSING_FIELD: &str = "body-missing-field";
    pub const BODY_TYPE_MISMATCH: &str = "body-type-mismatch";
    pub const BODY_VALUE_MISMATCH: &str = "body-value-mismatch";
    pub const BODY_ARRAY_LENGTH_MISMATCH: &str = "body-array-length-mismatch";
    pub const BODY_NOT_JSON: &str = "body-not-json";

    pub const UNKNOWN_CUSTOM_RULE: &str = "unknown-custom-rule";
    pub const INVALID_FIELD_PATH: &str = "invalid-field-path";
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationIssue {
    pub category: IssueCategory,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<JsonValue>,
    pub rule: String,
}

impl ValidationIssue {
    pub fn error(category: IssueCategory, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            severity: Severity::Error,
            message: message.into(),
            field: None,
            expected: None,
            actual: None,
            rule: rule.into(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_expected(mut self, expected: JsonValue) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn with_actual(mut self, actual: JsonValue) -> Self {
        self.actual = Some(actual);
        self
    }
}

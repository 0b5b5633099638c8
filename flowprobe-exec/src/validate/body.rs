use serde_json::Value as JsonValue;

use crate::validate::context::{child_index, child_key, display_field, ValidationContext};
use crate::validate::issue::{rule_names, IssueCategory, ValidationIssue};
use crate::validate::ResponseValidator;

/// Partial deep match of `expectations.body` against the response body.
///
/// Every key of the expected value must be present in the actual value with an equal
/// value; extra keys in the actual body are ignored. Arrays must have the same length
/// and are compared index by index. A type mismatch stops the walk at that node only.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralBodyValidator;

impl StructuralBodyValidator {
    pub fn compare(&self, expected: &JsonValue, actual: &JsonValue) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        compare_node(expected, actual, "", &mut issues);
        issues
    }
}

impl ResponseValidator for StructuralBodyValidator {
    fn category(&self) -> IssueCategory {
        IssueCategory::Body
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        let Some(expected) = &ctx.expectations.body else {
            return Vec::new();
        };
        match (&ctx.body_json, expected) {
            (Some(actual), _) => self.compare(expected, actual),
            (None, JsonValue::String(text)) if *text == ctx.body_text => Vec::new(),
            (None, JsonValue::String(text)) => vec![ValidationIssue::error(
                IssueCategory::Body,
                rule_names::BODY_VALUE_MISMATCH,
                "response body does not match the expected text",
            )
            .with_field(display_field(""))
            .with_expected(JsonValue::String(text.clone()))
            .with_actual(JsonValue::String(ctx.body_text.clone()))],
            (None, _) => vec![ValidationIssue::error(
                IssueCategory::Body,
                rule_names::BODY_NOT_JSON,
                "response body is not valid JSON",
            )
            .with_field(display_field(""))],
        }
    }
}

fn compare_node(expected: &JsonValue, actual: &JsonValue, path: &str, issues: &mut Vec<ValidationIssue>) {
    match (expected, actual) {
        (JsonValue::Object(exp), JsonValue::Object(act)) => {
            for (key, exp_val) in exp {
                let child = child_key(path, key);
                match act.get(key) {
                    Some(act_val) => compare_node(exp_val, act_val, &child, issues),
                    None => issues.push(
                        ValidationIssue::error(
                            IssueCategory::Body,
                            rule_names::BODY_MISSING_FIELD,
                            format!("missing field `{child}`"),
                        )
                        .with_field(child)
                        .with_expected(exp_val.clone()),
                    ),
                }
            }
        }
        (JsonValue::Array(exp), JsonValue::Array(act)) => {
            if exp.len() != act.len() {
                issues.push(
                    ValidationIssue::error(
                        IssueCategory::Body,
                        rule_names::BODY_ARRAY_LENGTH_MISMATCH,
                        format!(
                            "array `{}` has {} element(s), expected {}",
                            display_field(path),
                            act.len(),
                            exp.len()
                        ),
                    )
                    .with_field(display_field(path))
                    .with_expected(JsonValue::from(exp.len()))
                    .with_actual(JsonValue::from(act.len())),
                );
                return;
            }
            for (i, (e, a)) in exp.iter().zip(act).enumerate() {
                compare_node(e, a, &child_index(path, i), issues);
            }
        }
        (JsonValue::Number(e), JsonValue::Number(a)) => {
            let equal = match (e.as_f64(), a.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => e == a,
            };
            if !equal {
                issues.push(value_mismatch(expected, actual, path));
            }
        }
        (JsonValue::String(e), JsonValue::String(a)) => {
            if e != a {
                issues.push(value_mismatch(expected, actual, path));
            }
        }
        (JsonValue::Bool(e), JsonValue::Bool(a)) => {
            if e != a {
                issues.push(value_mismatch(expected, actual, path));
            }
        }
        (JsonValue::Null, _) => {
            if expected.to_string() != actual.to_string() {
                issues.push(value_mismatch(expected, actual, path));
            }
        }
        _ => issues.push(
            ValidationIssue::error(
                IssueCategory::Body,
                rule_names::BODY_TYPE_MISMATCH,
                format!(
                    "field `{}` is {}, expected {}",
                    display_field(path),
                    type_name(actual),
                    type_name(expected)
                ),
            )
            .with_field(display_field(path))
            .with_expected(JsonValue::String(type_name(expected).to_string()))
            .with_actual(JsonValue::String(type_name(actual).to_string())),
        ),
    }
}

fn value_mismatch(expected: &JsonValue, actual: &JsonValue, path: &str) -> ValidationIssue {
    ValidationIssue::error(
        IssueCategory::Body,
        rule_names::BODY_VALUE_MISMATCH,
        format!("field `{}` is {actual}, expected {expected}", display_field(path)),
    )
    .with_field(display_field(path))
    .with_expected(expected.clone())
    .with_actual(actual.clone())
}

fn type_name(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extra_actual_keys_are_ignored() {
        let issues = StructuralBodyValidator.compare(&json!({"a": 1, "b": {"c": 2}}), &json!({"a": 1, "b": {"c": 2, "d": 3}}));
        assert!(issues.is_empty());
    }

    #[test]
    fn integer_and_float_forms_compare_equal() {
        assert!(StructuralBodyValidator.compare(&json!({"n": 1}), &json!({"n": 1.0})).is_empty());
    }

    #[test]
    fn type_mismatch_stops_at_the_node_but_siblings_continue() {
        let issues = StructuralBodyValidator.compare(
            &json!({"a": {"x": 1}, "b": 2}),
            &json!({"a": "oops", "b": 3}),
        );
        let rules: Vec<_> = issues.iter().map(|i| i.rule.as_str()).collect();
        assert_eq!(rules, vec![rule_names::BODY_TYPE_MISMATCH, rule_names::BODY_VALUE_MISMATCH]);
        assert_eq!(issues[0].field.as_deref(), Some("a"));
        assert_eq!(issues[1].field.as_deref(), Some("b"));
    }

    #[test]
    fn expected_null_uses_serialized_equality() {
        assert!(StructuralBodyValidator.compare(&json!({"a": null}), &json!({"a": null})).is_empty());
        let issues = StructuralBodyValidator.compare(&json!({"a": null}), &json!({"a": 0}));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, rule_names::BODY_VALUE_MISMATCH);
    }

    #[test]
    fn nested_array_paths_use_index_notation() {
        let issues = StructuralBodyValidator.compare(
            &json!({"items": [{"id": 1}, {"id": 2}]}),
            &json!({"items": [{"id": 1}, {"id": 5}]}),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field.as_deref(), Some("items[1].id"));
    }
}

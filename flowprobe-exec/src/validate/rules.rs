use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use flowprobe_core::types::{CustomRule, RuleSeverity};
use flowprobe_core::FieldPath;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::validate::context::ValidationContext;
use crate::validate::engine::RuleCheck;
use crate::validate::issue::{rule_names, IssueCategory, Severity, ValidationIssue};
use crate::validate::ResponseValidator;

/// What a rule handler sees for one `expectations.custom` entry.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub field: &'a str,
    /// Value at `field`, `None` when the path does not resolve.
    pub value: Option<&'a JsonValue>,
    /// The rule's `value` argument.
    pub expected: Option<&'a JsonValue>,
    pub body: Option<&'a JsonValue>,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub valid: bool,
    pub message: Option<String>,
}

impl RuleOutcome {
    pub fn pass() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }
}

pub trait RuleHandler: Send + Sync {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> RuleOutcome;
}

impl<F> RuleHandler for F
where
    F: Fn(&RuleContext<'_>) -> RuleOutcome + Send + Sync,
{
    fn evaluate(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        self(ctx)
    }
}

/// Fails on a missing field or `null`.
pub struct NotNullRule;

impl RuleHandler for NotNullRule {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        match ctx.value {
            None => RuleOutcome::fail(format!("field `{}` is missing", ctx.field)),
            Some(JsonValue::Null) => RuleOutcome::fail(format!("field `{}` is null", ctx.field)),
            Some(_) => RuleOutcome::pass(),
        }
    }
}

/// Matches the field's text against the pattern given as the rule value.
pub struct RegexRule;

impl RuleHandler for RegexRule {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let Some(JsonValue::String(pattern)) = ctx.expected else {
            return RuleOutcome::fail("regex rule needs a string pattern as its value");
        };
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => return RuleOutcome::fail(format!("invalid regex `{pattern}`: {e}")),
        };
        let text = match ctx.value {
            Some(JsonValue::String(s)) => s.clone(),
            Some(v @ (JsonValue::Number(_) | JsonValue::Bool(_))) => v.to_string(),
            Some(_) | None => {
                return RuleOutcome::fail(format!("field `{}` is not a string", ctx.field));
            }
        };
        if re.is_match(&text) {
            RuleOutcome::pass()
        } else {
            RuleOutcome::fail(format!("field `{}` does not match /{pattern}/", ctx.field))
        }
    }
}

/// Substring test for strings, element test for arrays.
pub struct ContainsRule;

impl RuleHandler for ContainsRule {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let Some(expected) = ctx.expected else {
            return RuleOutcome::fail("contains rule needs a value");
        };
        let found = match (ctx.value, expected) {
            (Some(JsonValue::String(s)), JsonValue::String(needle)) => s.contains(needle.as_str()),
            (Some(JsonValue::Array(items)), _) => items.iter().any(|item| item == expected),
            (Some(_), _) => {
                return RuleOutcome::fail(format!("field `{}` is neither a string nor an array", ctx.field));
            }
            (None, _) => return RuleOutcome::fail(format!("field `{}` is missing", ctx.field)),
        };
        if found {
            RuleOutcome::pass()
        } else {
            RuleOutcome::fail(format!("field `{}` does not contain {expected}", ctx.field))
        }
    }
}

/// Named rule handlers, open for registration.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    handlers: BTreeMap<String, Arc<dyn RuleHandler>>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// `notNull`, `regex` and `contains`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("notNull", NotNullRule);
        registry.register("regex", RegexRule);
        registry.register("contains", ContainsRule);
        registry
    }

    /// Adds or replaces the handler for `name`.
    pub fn register(&mut self, name: impl Into<String>, handler: impl RuleHandler + 'static) {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn RuleHandler>> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

/// Runs `expectations.custom` against the registry.
#[derive(Debug, Clone)]
pub struct CustomRuleValidator {
    registry: RuleRegistry,
}

impl Default for CustomRuleValidator {
    fn default() -> Self {
        Self::new(RuleRegistry::with_builtins())
    }
}

impl CustomRuleValidator {
    pub fn new(registry: RuleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut RuleRegistry {
        &mut self.registry
    }

    /// One check per rule, in declaration order, with the issue for failed ones.
    pub fn evaluate_rules(&self, ctx: &ValidationContext<'_>) -> Vec<(RuleCheck, Option<ValidationIssue>)> {
        ctx.expectations
            .custom
            .iter()
            .map(|rule| {
                let issue = self.evaluate_rule(rule, ctx);
                let check = RuleCheck {
                    field: rule.field.clone(),
                    rule: rule.rule.clone(),
                    passed: issue.is_none(),
                };
                (check, issue)
            })
            .collect()
    }

    fn evaluate_rule(&self, rule: &CustomRule, ctx: &ValidationContext<'_>) -> Option<ValidationIssue> {
        let severity = match rule.severity.unwrap_or_default() {
            RuleSeverity::Error => Severity::Error,
            RuleSeverity::Warning => Severity::Warning,
        };

        let Some(handler) = self.registry.get(&rule.rule) else {
            return Some(
                ValidationIssue::error(
                    IssueCategory::Custom,
                    rule_names::UNKNOWN_CUSTOM_RULE,
                    format!("unknown custom rule `{}`", rule.rule),
                )
                .with_field(rule.field.clone()),
            );
        };

        let path = match FieldPath::parse(&rule.field) {
            Ok(p) => p,
            Err(e) => {
                return Some(
                    ValidationIssue::error(
                        IssueCategory::Custom,
                        rule_names::INVALID_FIELD_PATH,
                        format!("invalid field path `{}`: {e}", rule.field),
                    )
                    .with_field(rule.field.clone()),
                );
            }
        };

        let value = ctx.body_json.as_ref().and_then(|body| path.resolve(body));
        let outcome = handler.evaluate(&RuleContext {
            field: &rule.field,
            value,
            expected: rule.value.as_ref(),
            body: ctx.body_json.as_ref(),
            status: ctx.status,
        });
        if outcome.valid {
            return None;
        }

        let message = rule
            .message
            .clone()
            .or(outcome.message)
            .unwrap_or_else(|| format!("rule `{}` failed for field `{}`", rule.rule, rule.field));
        let mut issue = ValidationIssue::error(IssueCategory::Custom, rule.rule.clone(), message)
            .with_severity(severity)
            .with_field(rule.field.clone())
            .with_actual(value.cloned().unwrap_or(JsonValue::Null));
        if let Some(expected) = &rule.value {
            issue = issue.with_expected(expected.clone());
        }
        Some(issue)
    }
}

impl ResponseValidator for CustomRuleValidator {
    fn category(&self) -> IssueCategory {
        IssueCategory::Custom
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        self.evaluate_rules(ctx)
            .into_iter()
            .filter_map(|(_, issue)| issue)
            .collect()
    }
}

mod body;
mod context;
mod engine;
mod issue;
mod rules;
mod schema;
mod status;

pub use body::StructuralBodyValidator;
pub use context::{SchemaRegistry, ValidationContext, ValidationInput};
pub use engine::{OutcomeStatus, RuleCheck, ValidationEngine, ValidationOutcome, ValidationPatch};
pub use issue::{rule_names, IssueCategory, Severity, ValidationIssue};
pub use rules::{
    ContainsRule, CustomRuleValidator, NotNullRule, RegexRule, RuleContext, RuleHandler,
    RuleOutcome, RuleRegistry,
};
pub use schema::SchemaValidator;
pub use status::StatusValidator;

/// One of the response validators run by [`ValidationEngine`].
pub trait ResponseValidator {
    fn category(&self) -> IssueCategory;

    /// Issues for this response; empty when the matching expectation is absent or met.
    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue>;
}

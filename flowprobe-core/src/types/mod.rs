mod auth;
mod common;
mod flow;
mod retry;
mod step;

pub use auth::{GlobalAuth, StaticTokenDecl, StepAuth, DEFAULT_NAMESPACE};
pub use common::{AnyValue, Headers};
pub use flow::{FlowDefinition, FlowGlobals, FlowOptions};
pub use retry::{CircuitBreakerPolicy, RetryPolicy};
pub use step::{CustomRule, Expectations, FlowStep, RuleSeverity, StepRequest};

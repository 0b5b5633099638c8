#![forbid(unsafe_code)]

//! Flow execution engine for flowprobe.
//!
//! Runs the steps of a [`FlowDefinition`](flowprobe_core::FlowDefinition) in order, keeping
//! authentication tokens between steps, retrying transient transport failures behind a
//! circuit breaker, and validating every response.

pub mod auth;
pub mod executor;
pub mod retry;
pub mod validate;

pub use crate::auth::{AuthError, AuthHandler, TokenInfo, TokenStore};
pub use crate::executor::{
    ExecutionError, ExecutorConfig, HttpClient, Orchestrator, ReqwestHttpClient, RunOptions,
    RunSummary, TestResult, TestStatus,
};
pub use crate::retry::{CircuitBreaker, CircuitState, ResilienceError, RetryConfig, RetryExecutor};
pub use crate::validate::{SchemaRegistry, ValidationEngine, ValidationIssue, ValidationOutcome};

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use flowprobe_core::types::FlowDefinition;
use futures_util::FutureExt;
use tokio::time::Instant;
use uuid::Uuid;

use crate::auth::{AuthHandler, TokenInfo};
use crate::executor::events::{Event, EventSink};
use crate::executor::http::HttpClient;
use crate::executor::result::{ExecutionError, RunSummary, TestResult};
use crate::executor::step_runner::StepRunner;
use crate::executor::types::{ExecutorConfig, RunOptions};
use crate::retry::{CircuitSnapshot, RetryExecutor};
use crate::validate::{RuleHandler, SchemaRegistry, ValidationEngine};

/// Runs flows step by step.
///
/// Owns the token store (through its [`AuthHandler`]) and the circuit breaker (through
/// its [`RetryExecutor`]), so both persist across runs of the same orchestrator and are
/// never shared with another one.
pub struct Orchestrator {
    config: ExecutorConfig,
    http: Arc<dyn HttpClient>,
    auth: AuthHandler,
    retry: RetryExecutor,
    validator: ValidationEngine,
    schemas: SchemaRegistry,
    events: Arc<dyn EventSink>,
}

impl Orchestrator {
    pub fn new(config: ExecutorConfig, http: Arc<dyn HttpClient>, events: Arc<dyn EventSink>) -> Self {
        let retry = RetryExecutor::new(config.retry.clone(), config.circuit_breaker.clone())
            .with_events(events.clone());
        Self {
            config,
            http,
            auth: AuthHandler::new(),
            retry,
            validator: ValidationEngine::new(),
            schemas: SchemaRegistry::new(),
            events,
        }
    }

    pub fn with_auth_handler(mut self, auth: AuthHandler) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_validation_engine(mut self, validator: ValidationEngine) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_schemas(mut self, schemas: SchemaRegistry) -> Self {
        self.set_schemas(schemas);
        self
    }

    /// Replaces the schema registry and drops schemas compiled from the old one.
    pub fn set_schemas(&mut self, schemas: SchemaRegistry) {
        self.schemas = schemas;
        self.validator.clear_schema_cache();
    }

    pub fn register_rule(&mut self, name: impl Into<String>, handler: impl RuleHandler + 'static) {
        self.validator.register_rule(name, handler);
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthHandler {
        &self.auth
    }

    pub fn auth_mut(&mut self) -> &mut AuthHandler {
        &mut self.auth
    }

    pub fn get_all_tokens_status(&mut self) -> Vec<TokenInfo> {
        self.auth.get_all_tokens_status()
    }

    pub fn clear_all_tokens(&mut self) {
        self.auth.clear_all_tokens();
    }

    pub fn circuit_status(&self) -> CircuitSnapshot {
        self.retry.circuit_status()
    }

    pub fn reset_circuit(&mut self) {
        self.retry.reset_circuit();
    }

    /// Runs every step of `flow` in order and returns one result per executed step.
    ///
    /// With `failFast`, the first failed step ends the run and later steps are absent
    /// from the result. Step failures, including panics, never surface as `Err`; only
    /// a global static token that cannot be loaded does.
    pub async fn run(
        &mut self,
        flow: &FlowDefinition,
        options: RunOptions,
    ) -> Result<Vec<TestResult>, ExecutionError> {
        let execution_id = options.execution_id.unwrap_or_else(Uuid::new_v4);
        let globals = flow.globals.as_ref();

        let retry_config = match globals.and_then(|g| g.retry.as_ref()) {
            Some(p) => self.config.retry.with_policy(p),
            None => self.config.retry.clone(),
        };
        let breaker_config = match globals.and_then(|g| g.circuit_breaker.as_ref()) {
            Some(p) => self.config.circuit_breaker.with_policy(p),
            None => self.config.circuit_breaker.clone(),
        };
        self.retry.breaker_mut().set_config(breaker_config);

        tracing::info!(flow = %flow.id, %execution_id, steps = flow.steps.len(), "starting flow run");
        self.events
            .emit(Event::RunStarted {
                execution_id,
                flow_id: flow.id.clone(),
                steps: flow.steps.len(),
            })
            .await;

        if let Some(auth) = globals.and_then(|g| g.auth.as_ref()) {
            if !auth.static_tokens.is_empty() {
                match self.auth.load_static_tokens(&auth.static_tokens) {
                    Ok(namespaces) => {
                        self.events
                            .emit(Event::StaticTokensLoaded {
                                execution_id,
                                namespaces,
                            })
                            .await;
                    }
                    Err(e) => {
                        tracing::error!(flow = %flow.id, %execution_id, code = e.code(), error = %e, "static auth failed");
                        self.events
                            .emit(Event::RunFinished {
                                execution_id,
                                flow_id: flow.id.clone(),
                                passed: 0,
                                failed: 0,
                                aborted: true,
                            })
                            .await;
                        return Err(ExecutionError::StaticAuth(e));
                    }
                }
            }
        }

        let fail_fast = flow.fail_fast();
        let mut results = Vec::with_capacity(flow.steps.len());

        for (index, step) in flow.steps.iter().enumerate() {
            self.events
                .emit(Event::StepStarted {
                    execution_id,
                    step: step.name.clone(),
                    index,
                })
                .await;

            let started = Instant::now();
            let mut runner = StepRunner {
                config: &self.config,
                http: self.http.as_ref(),
                auth: &mut self.auth,
                retry: &mut self.retry,
                retry_config: &retry_config,
                validator: &self.validator,
                schemas: &self.schemas,
                events: self.events.as_ref(),
                execution_id,
            };
            let result = match AssertUnwindSafe(runner.run(flow, step)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(step = %step.name, %execution_id, panic = %message, "step panicked");
                    TestResult::failed(
                        &step.name,
                        started.elapsed(),
                        format!("unexpected error: {message}"),
                    )
                }
            };

            let duration_ms = result.duration.as_millis() as u64;
            let failed = result.is_failed();
            if failed {
                self.events
                    .emit(Event::StepFailed {
                        execution_id,
                        step: step.name.clone(),
                        duration_ms,
                        error: result.error.clone().unwrap_or_default(),
                    })
                    .await;
            } else {
                self.events
                    .emit(Event::StepSucceeded {
                        execution_id,
                        step: step.name.clone(),
                        duration_ms,
                    })
                    .await;
            }
            results.push(result);

            if failed && fail_fast {
                tracing::info!(step = %step.name, %execution_id, "fail-fast: stopping flow");
                self.events
                    .emit(Event::FlowAborted {
                        execution_id,
                        step: step.name.clone(),
                    })
                    .await;
                break;
            }
        }

        let summary = RunSummary::from_results(&results, flow.steps.len());
        tracing::info!(
            flow = %flow.id,
            %execution_id,
            passed = summary.passed,
            failed = summary.failed,
            aborted = summary.aborted,
            "flow run finished"
        );
        self.events
            .emit(Event::RunFinished {
                execution_id,
                flow_id: flow.id.clone(),
                passed: summary.passed,
                failed: summary.failed,
                aborted: summary.aborted,
            })
            .await;
        Ok(results)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "step panicked".to_string()
    }
}

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::executor::events::{Event, EventSink, NoOpEventSink};
use crate::retry::circuit::{CircuitBreaker, CircuitSnapshot, CircuitState};
use crate::retry::classify::{is_retryable, Retryable};
use crate::retry::config::{backoff_delay, CircuitBreakerConfig, RetryConfig};
use crate::retry::error::ResilienceError;

/// Identifies the call in emitted events.
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    pub execution_id: Uuid,
    pub step: String,
}

impl RetryContext {
    pub fn new(execution_id: Uuid, step: impl Into<String>) -> Self {
        Self {
            execution_id,
            step: step.into(),
        }
    }
}

/// Retries an operation with exponential backoff behind one circuit breaker.
pub struct RetryExecutor {
    config: RetryConfig,
    breaker: CircuitBreaker,
    events: Arc<dyn EventSink>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig, breaker: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breaker: CircuitBreaker::new(breaker),
            events: Arc::new(NoOpEventSink),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn breaker_mut(&mut self) -> &mut CircuitBreaker {
        &mut self.breaker
    }

    pub fn circuit_status(&self) -> CircuitSnapshot {
        self.breaker.snapshot()
    }

    pub fn reset_circuit(&mut self) {
        self.breaker.reset();
    }

    /// Runs `operation` under the executor's own retry configuration.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &mut self,
        operation: F,
        ctx: &RetryContext,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let cfg = self.config.clone();
        self.execute_with_policy(operation, &cfg, ctx).await
    }

    /// Like [`execute_with_retry`](Self::execute_with_retry) with a per-call configuration.
    /// The breaker is shared with every other call on this executor. A failure that opens
    /// it ends the loop at once with [`ResilienceError::RetryExhausted`].
    pub async fn execute_with_policy<T, E, F, Fut>(
        &mut self,
        mut operation: F,
        cfg: &RetryConfig,
        ctx: &RetryContext,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = cfg.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            let before = self.breaker.state();
            let allowed = self.breaker.can_execute();
            self.note_transition(before, ctx).await;
            if !allowed {
                let retry_in = self.breaker.retry_in();
                self.events
                    .emit(Event::CircuitRejected {
                        execution_id: ctx.execution_id,
                        step: ctx.step.clone(),
                        retry_in_ms: retry_in.as_millis() as u64,
                    })
                    .await;
                return Err(ResilienceError::CircuitOpen { retry_in });
            }

            attempt += 1;
            self.events
                .emit(Event::AttemptStarted {
                    execution_id: ctx.execution_id,
                    step: ctx.step.clone(),
                    attempt,
                })
                .await;

            let err = match operation().await {
                Ok(value) => {
                    let before = self.breaker.state();
                    self.breaker.record_success();
                    self.note_transition(before, ctx).await;
                    return Ok(value);
                }
                Err(err) => err,
            };

            let before = self.breaker.state();
            self.breaker.record_failure();
            self.note_transition(before, ctx).await;

            let retryable = is_retryable(&err);
            tracing::debug!(
                step = %ctx.step,
                attempt,
                retryable,
                error = %err,
                "attempt failed"
            );
            self.events
                .emit(Event::AttemptFailed {
                    execution_id: ctx.execution_id,
                    step: ctx.step.clone(),
                    attempt,
                    retryable,
                    error: err.to_string(),
                })
                .await;

            if !retryable {
                return Err(ResilienceError::Aborted {
                    attempts: attempt,
                    source: err,
                });
            }
            if attempt >= max_attempts || self.breaker.state() == CircuitState::Open {
                return Err(ResilienceError::RetryExhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = backoff_delay(cfg, attempt - 1);
            self.events
                .emit(Event::RetryScheduled {
                    execution_id: ctx.execution_id,
                    step: ctx.step.clone(),
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                })
                .await;
            tokio::time::sleep(delay).await;
        }
    }

    async fn note_transition(&self, before: CircuitState, ctx: &RetryContext) {
        let after = self.breaker.state();
        if before == after {
            return;
        }
        tracing::info!(step = %ctx.step, from = %before, to = %after, "circuit breaker state changed");
        self.events
            .emit(Event::CircuitStateChanged {
                execution_id: ctx.execution_id,
                step: ctx.step.clone(),
                from: before,
                to: after,
            })
            .await;
    }
}

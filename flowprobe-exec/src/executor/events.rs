use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::retry::CircuitState;

#[derive(Debug, Clone)]
pub enum Event {
    RunStarted {
        execution_id: Uuid,
        flow_id: String,
        steps: usize,
    },
    RunFinished {
        execution_id: Uuid,
        flow_id: String,
        passed: usize,
        failed: usize,
        aborted: bool,
    },
    StaticTokensLoaded {
        execution_id: Uuid,
        namespaces: Vec<String>,
    },
    StepStarted {
        execution_id: Uuid,
        step: String,
        index: usize,
    },
    StepSucceeded {
        execution_id: Uuid,
        step: String,
        duration_ms: u64,
    },
    StepFailed {
        execution_id: Uuid,
        step: String,
        duration_ms: u64,
        error: String,
    },
    AuthResolved {
        execution_id: Uuid,
        step: String,
        kind: &'static str,
        namespace: String,
        success: bool,
        error_code: Option<u16>,
    },
    AttemptStarted {
        execution_id: Uuid,
        step: String,
        attempt: u32,
    },
    AttemptFailed {
        execution_id: Uuid,
        step: String,
        attempt: u32,
        retryable: bool,
        error: String,
    },
    RetryScheduled {
        execution_id: Uuid,
        step: String,
        attempt: u32,
        delay_ms: u64,
    },
    CircuitStateChanged {
        execution_id: Uuid,
        step: String,
        from: CircuitState,
        to: CircuitState,
    },
    CircuitRejected {
        execution_id: Uuid,
        step: String,
        retry_in_ms: u64,
    },
    FlowAborted {
        execution_id: Uuid,
        step: String,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::RunStarted { .. } => "run.started",
            Event::RunFinished { .. } => "run.finished",
            Event::StaticTokensLoaded { .. } => "auth.static_loaded",
            Event::StepStarted { .. } => "step.started",
            Event::StepSucceeded { .. } => "step.succeeded",
            Event::StepFailed { .. } => "step.failed",
            Event::AuthResolved { .. } => "auth.resolved",
            Event::AttemptStarted { .. } => "attempt.started",
            Event::AttemptFailed { .. } => "attempt.failed",
            Event::RetryScheduled { .. } => "step.retry_scheduled",
            Event::CircuitStateChanged { .. } => "circuit.state_changed",
            Event::CircuitRejected { .. } => "circuit.rejected",
            Event::FlowAborted { .. } => "run.aborted",
        }
    }

    /// True for events that report something going wrong.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::StepFailed { .. }
                | Event::AttemptFailed { .. }
                | Event::CircuitRejected { .. }
                | Event::FlowAborted { .. }
                | Event::AuthResolved { success: false, .. }
        )
    }

    pub fn to_json(&self) -> serde_json::Value {
        let kind = self.kind();
        match self {
            Event::RunStarted { execution_id, flow_id, steps } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "flow_id": flow_id, "steps": steps })
            }
            Event::RunFinished { execution_id, flow_id, passed, failed, aborted } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "flow_id": flow_id, "passed": passed, "failed": failed, "aborted": aborted })
            }
            Event::StaticTokensLoaded { execution_id, namespaces } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "namespaces": namespaces })
            }
            Event::StepStarted { execution_id, step, index } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "step": step, "index": index })
            }
            Event::StepSucceeded { execution_id, step, duration_ms } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "step": step, "duration_ms": duration_ms })
            }
            Event::StepFailed { execution_id, step, duration_ms, error } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "step": step, "duration_ms": duration_ms, "error": error })
            }
            Event::AuthResolved { execution_id, step, kind: auth_kind, namespace, success, error_code } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "step": step, "auth": auth_kind, "namespace": namespace, "success": success, "error_code": error_code })
            }
            Event::AttemptStarted { execution_id, step, attempt } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "step": step, "attempt": attempt })
            }
            Event::AttemptFailed { execution_id, step, attempt, retryable, error } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "step": step, "attempt": attempt, "retryable": retryable, "error": error })
            }
            Event::RetryScheduled { execution_id, step, attempt, delay_ms } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "step": step, "attempt": attempt, "delay_ms": delay_ms })
            }
            Event::CircuitStateChanged { execution_id, step, from, to } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "step": step, "from": from.as_str(), "to": to.as_str() })
            }
            Event::CircuitRejected { execution_id, step, retry_in_ms } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "step": step, "retry_in_ms": retry_in_ms })
            }
            Event::FlowAborted { execution_id, step } => {
                json!({ "type": kind, "execution_id": execution_id.to_string(), "step": step })
            }
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event);
}

pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: Event) {}
}

pub struct CompositeEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl Default for CompositeEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl EventSink for CompositeEventSink {
    async fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}

/// One JSON object per line on stdout.
pub struct StdoutEventSink;

#[async_trait]
impl EventSink for StdoutEventSink {
    async fn emit(&self, event: Event) {
        println!("{}", serde_json::to_string(&event.to_json()).unwrap_or_default());
    }
}

/// Forwards events to `tracing`; failures at WARN, the rest at INFO.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: Event) {
        let payload = event.to_json();
        if event.is_failure() {
            tracing::warn!(target: "flowprobe::events", event = event.kind(), %payload);
        } else {
            tracing::info!(target: "flowprobe::events", event = event.kind(), %payload);
        }
    }
}

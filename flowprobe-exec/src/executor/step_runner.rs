use flowprobe_core::types::{FlowDefinition, FlowStep, StepAuth};
use serde_json::Value as JsonValue;
use tokio::time::Instant;
use uuid::Uuid;

use crate::auth::{AuthError, AuthHandler};
use crate::executor::events::{Event, EventSink};
use crate::executor::http::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::executor::request::build_request;
use crate::executor::response::{parse_body_json, to_step_response};
use crate::executor::result::{AuthStatus, TestResult, TestStatus};
use crate::executor::types::ExecutorConfig;
use crate::retry::{is_retryable_status, ResilienceError, RetryConfig, RetryContext, RetryExecutor, Retryable};
use crate::validate::{SchemaRegistry, ValidationEngine, ValidationInput};

/// Failure of one transport attempt as seen by the retry layer.
#[derive(Debug, thiserror::Error)]
pub(crate) enum StepCallError {
    #[error(transparent)]
    Transport(#[from] HttpError),
    #[error("server responded with status {}", .0.status)]
    Status(Box<HttpResponse>),
}

impl Retryable for StepCallError {
    fn error_code(&self) -> Option<&str> {
        match self {
            StepCallError::Transport(e) => Some(e.code()),
            StepCallError::Status(_) => None,
        }
    }

    fn http_status(&self) -> Option<u16> {
        match self {
            StepCallError::Transport(_) => None,
            StepCallError::Status(resp) => Some(resp.status),
        }
    }
}

/// Sends once. A retryable status becomes an error unless the step expects exactly it.
async fn send_checked(
    http: &dyn HttpClient,
    req: HttpRequest,
    expected_status: Option<u16>,
) -> Result<HttpResponse, StepCallError> {
    let resp = http.send(req).await?;
    if is_retryable_status(resp.status) && expected_status != Some(resp.status) {
        return Err(StepCallError::Status(Box::new(resp)));
    }
    Ok(resp)
}

/// Borrowed pieces of an orchestrator needed to run one step.
pub(crate) struct StepRunner<'a> {
    pub config: &'a ExecutorConfig,
    pub http: &'a dyn HttpClient,
    pub auth: &'a mut AuthHandler,
    pub retry: &'a mut RetryExecutor,
    pub retry_config: &'a RetryConfig,
    pub validator: &'a ValidationEngine,
    pub schemas: &'a SchemaRegistry,
    pub events: &'a dyn EventSink,
    pub execution_id: Uuid,
}

impl StepRunner<'_> {
    /// auth (static) -> build -> send with retry -> auth (login) -> validate.
    pub async fn run(&mut self, flow: &FlowDefinition, step: &FlowStep) -> TestResult {
        let started = Instant::now();
        let mut auth_status = None;

        if let Some(StepAuth::Static { namespace }) = &step.auth {
            let resolved = self.auth.handle_step_auth(step, None, Some(self.execution_id));
            self.emit_auth(step, namespace, resolved.as_ref().err()).await;
            match resolved {
                Ok(()) => auth_status = Some(AuthStatus::succeeded(namespace)),
                Err(e) => {
                    return TestResult::failed(
                        &step.name,
                        started.elapsed(),
                        format!("authentication failed: {e}"),
                    )
                    .with_auth_status(AuthStatus::failed(namespace, &e));
                }
            }
        }

        let mut request = match build_request(flow, step, self.config) {
            Ok(r) => r,
            Err(e) => {
                let mut result = TestResult::failed(
                    &step.name,
                    started.elapsed(),
                    format!("failed to build request: {e}"),
                );
                result.auth_status = auth_status;
                return result;
            }
        };
        if let Some(StepAuth::Static { namespace }) = &step.auth {
            request.headers = self
                .auth
                .inject_auth_header(std::mem::take(&mut request.headers), namespace);
        }

        let policy = match &step.retry {
            Some(p) => self.retry_config.with_policy(p),
            None => self.retry_config.clone(),
        };
        let ctx = RetryContext::new(self.execution_id, step.name.clone());
        let expected_status = step.expectations.status;
        let http = self.http;
        let request = &request;
        let mut attempts = 0u32;
        let outcome = self
            .retry
            .execute_with_policy(
                || {
                    attempts += 1;
                    let req = request.clone();
                    async move { send_checked(http, req, expected_status).await }
                },
                &policy,
                &ctx,
            )
            .await;

        let response = match outcome {
            Ok(resp) => resp,
            Err(ResilienceError::RetryExhausted {
                source: StepCallError::Status(resp),
                ..
            }) => *resp,
            Err(e) => {
                let mut result =
                    TestResult::failed(&step.name, started.elapsed(), e.to_string()).with_attempts(attempts);
                if let Some(StepAuth::Login { namespace, .. }) = &step.auth {
                    auth_status = Some(AuthStatus::not_attempted(
                        namespace,
                        "request failed before a token could be extracted",
                    ));
                }
                result.auth_status = auth_status;
                return result;
            }
        };

        if let Some(StepAuth::Login { namespace, .. }) = &step.auth {
            let body = parse_body_json(&response).unwrap_or(JsonValue::Null);
            let resolved = self
                .auth
                .handle_step_auth(step, Some(&body), Some(self.execution_id));
            self.emit_auth(step, namespace, resolved.as_ref().err()).await;
            auth_status = Some(match resolved {
                Ok(()) => AuthStatus::succeeded(namespace),
                Err(e) => AuthStatus::failed(namespace, &e),
            });
        }

        let validation = self.validator.validate_response(&ValidationInput {
            step,
            response: &response,
            expectations: &step.expectations,
            schemas: self.schemas,
        });

        let mut errors = Vec::new();
        if let Some(AuthStatus {
            auth_success: false,
            auth_error: Some(msg),
            ..
        }) = &auth_status
        {
            errors.push(format!("authentication failed: {msg}"));
        }
        errors.extend(validation.summary());
        let status = if errors.is_empty() {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        };

        TestResult {
            step: step.name.clone(),
            status,
            duration: started.elapsed(),
            response: Some(to_step_response(&response, &self.config.sensitive_headers)),
            error: (!errors.is_empty()).then(|| errors.join("; ")),
            auth_status,
            validation: Some(validation),
            attempts,
        }
    }

    async fn emit_auth(&self, step: &FlowStep, namespace: &str, err: Option<&AuthError>) {
        let kind = step.auth.as_ref().map(|a| a.kind()).unwrap_or("none");
        if let Some(e) = err {
            tracing::warn!(
                step = %step.name,
                namespace,
                code = e.code(),
                error = %e,
                "step auth failed"
            );
        }
        self.events
            .emit(Event::AuthResolved {
                execution_id: self.execution_id,
                step: step.name.clone(),
                kind,
                namespace: namespace.to_string(),
                success: err.is_none(),
                error_code: err.map(AuthError::code),
            })
            .await;
    }
}

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flowprobe_core::types::FlowDefinition;
use flowprobe_core::{parse_flow_str, FlowFormat};
use flowprobe_exec::auth::{AuthError, AuthHandler, REDACTED};
use flowprobe_exec::executor::{
    Event, EventSink, ExecutionError, ExecutorConfig, HttpClient, HttpError, HttpRequest,
    HttpResponse, NoOpEventSink, Orchestrator, RunOptions, RunSummary, TestStatus,
};
use flowprobe_exec::retry::CircuitState;
use flowprobe_exec::validate::{rule_names, IssueCategory};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Default)]
struct MockState {
    routes: BTreeMap<String, VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Vec<HttpRequest>,
}

#[derive(Clone, Default)]
struct MockHttpClient {
    state: Arc<Mutex<MockState>>,
}

impl MockHttpClient {
    fn respond(&self, path: &str, status: u16, body: Value) {
        self.push(path, Ok(response(status, body)));
    }

    fn push(&self, path: &str, outcome: Result<HttpResponse, HttpError>) {
        self.state
            .lock()
            .unwrap()
            .routes
            .entry(path.to_string())
            .or_default()
            .push_back(outcome);
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    fn paths(&self) -> Vec<String> {
        self.requests().iter().map(|r| r.url.path().to_string()).collect()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        if req.url.path() == "/boom" {
            panic!("transport exploded");
        }
        let mut state = self.state.lock().unwrap();
        let path = req.url.path().to_string();
        state.requests.push(req);
        state
            .routes
            .get_mut(&path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(response(200, json!({}))))
    }
}

struct CollectingSink(Arc<Mutex<Vec<Event>>>);

#[async_trait]
impl EventSink for CollectingSink {
    async fn emit(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }
}

fn response(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
        body: body.to_string().into_bytes(),
        duration: Duration::from_millis(3),
    }
}

fn flow(steps: Value, extra: Value) -> FlowDefinition {
    let mut doc = json!({
        "id": "orders-flow",
        "globals": { "baseUrl": "https://api.test" },
        "steps": steps
    });
    if let (Some(doc), Some(extra)) = (doc.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            if k == "globals" {
                if let (Some(g), Some(extra_g)) = (doc["globals"].as_object_mut(), v.as_object()) {
                    g.extend(extra_g.clone());
                }
            } else {
                doc.insert(k.clone(), v.clone());
            }
        }
    }
    serde_json::from_value(doc).unwrap()
}

fn get(name: &str, path: &str, expect_status: u16) -> Value {
    json!({
        "name": name,
        "request": { "method": "GET", "url": path },
        "expectations": { "status": expect_status }
    })
}

fn orchestrator(http: &MockHttpClient, env: &[(&str, &str)]) -> Orchestrator {
    let env: BTreeMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Orchestrator::new(
        ExecutorConfig::default(),
        Arc::new(http.clone()),
        Arc::new(NoOpEventSink),
    )
    .with_auth_handler(AuthHandler::with_env(env))
}

#[tokio::test]
async fn continue_on_error_runs_every_step() {
    let http = MockHttpClient::default();
    http.respond("/a", 404, json!({ "error": "nope" }));
    let f = flow(
        json!([get("a", "/a", 200), get("b", "/b", 200), get("c", "/c", 200)]),
        json!({}),
    );

    let results = orchestrator(&http, &[]).run(&f, RunOptions::default()).await.unwrap();

    let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![TestStatus::Failed, TestStatus::Passed, TestStatus::Passed]);
    let names: Vec<_> = results.iter().map(|r| r.step.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(http.paths(), vec!["/a", "/b", "/c"]);

    let first = &results[0];
    assert_eq!(first.attempts, 1);
    let validation = first.validation.as_ref().unwrap();
    assert_eq!(validation.issues[0].rule, rule_names::STATUS_CODE_MISMATCH);
    assert!(first.error.as_deref().unwrap().contains("expected status 200, got 404"));
}

#[tokio::test]
async fn fail_fast_stops_at_the_first_failed_step() {
    let http = MockHttpClient::default();
    http.respond("/b", 404, json!({}));
    let f = flow(
        json!([get("a", "/a", 200), get("b", "/b", 200), get("c", "/c", 200)]),
        json!({ "options": { "failFast": true } }),
    );

    let results = orchestrator(&http, &[]).run(&f, RunOptions::default()).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[1].status, TestStatus::Failed);
    assert_eq!(http.paths(), vec!["/a", "/b"]);
    let summary = RunSummary::from_results(&results, f.steps.len());
    assert!(summary.aborted);
    assert_eq!((summary.passed, summary.failed), (1, 1));
}

#[tokio::test]
async fn missing_static_token_fails_the_step_without_a_request() {
    let http = MockHttpClient::default();
    let f = flow(
        json!([
            {
                "name": "orders",
                "request": { "method": "GET", "url": "/orders" },
                "auth": { "type": "static", "namespace": "api" }
            },
            get("health", "/health", 200)
        ]),
        json!({}),
    );

    let results = orchestrator(&http, &[]).run(&f, RunOptions::default()).await.unwrap();

    assert_eq!(results.len(), 2);
    let orders = &results[0];
    assert_eq!(orders.status, TestStatus::Failed);
    assert!(orders.response.is_none());
    assert_eq!(orders.attempts, 0);
    let auth = orders.auth_status.as_ref().unwrap();
    assert!(auth.has_auth);
    assert!(!auth.auth_success);
    assert_eq!(auth.auth_error_code, Some(1001));
    assert_eq!(auth.namespace.as_deref(), Some("api"));
    assert_eq!(results[1].status, TestStatus::Passed);
    assert_eq!(http.paths(), vec!["/health"]);
}

#[tokio::test]
async fn login_token_is_injected_into_later_static_steps() {
    let http = MockHttpClient::default();
    http.respond(
        "/login",
        200,
        json!({ "data": { "access_token": "tok-0123456789abcdef" } }),
    );
    let f = flow(
        json!([
            {
                "name": "login",
                "request": { "method": "POST", "url": "/login", "body": { "user": "demo" } },
                "expectations": { "status": 200 },
                "auth": { "type": "login", "tokenPath": "data.access_token", "namespace": "api", "expiresIn": 600 }
            },
            {
                "name": "orders",
                "request": {
                    "method": "GET",
                    "url": "/orders",
                    "headers": { "authorization": "Basic stale" }
                },
                "auth": { "type": "static", "namespace": "api" }
            }
        ]),
        json!({}),
    );

    let mut orch = orchestrator(&http, &[]);
    let results = orch.run(&f, RunOptions::default()).await.unwrap();

    assert!(results.iter().all(|r| r.status == TestStatus::Passed));
    let requests = http.requests();
    let orders = &requests[1];
    assert_eq!(
        orders.headers.get("Authorization").map(String::as_str),
        Some("Bearer tok-0123456789abcdef")
    );
    assert!(!orders.headers.contains_key("authorization"));
    assert_eq!(requests[0].headers["Content-Type"], "application/json");

    let login = &results[0];
    let recorded = &login.response.as_ref().unwrap().body;
    assert_eq!(recorded["data"]["access_token"], REDACTED);
    assert!(login.auth_status.as_ref().unwrap().auth_success);

    let tokens = orch.get_all_tokens_status();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].namespace, "api");
    orch.clear_all_tokens();
    assert!(orch.get_all_tokens_status().is_empty());
}

#[tokio::test]
async fn failed_extraction_still_validates_and_fails_the_step() {
    let http = MockHttpClient::default();
    http.respond("/login", 401, json!({ "error": "bad credentials" }));
    let f = flow(
        json!([{
            "name": "login",
            "request": { "method": "POST", "url": "/login" },
            "expectations": { "status": 200 },
            "auth": { "type": "login", "tokenPath": "token" }
        }]),
        json!({}),
    );

    let results = orchestrator(&http, &[]).run(&f, RunOptions::default()).await.unwrap();

    let login = &results[0];
    assert_eq!(login.status, TestStatus::Failed);
    assert_eq!(http.paths(), vec!["/login"]);
    assert_eq!(login.auth_status.as_ref().unwrap().auth_error_code, Some(1003));
    let validation = login.validation.as_ref().unwrap();
    assert_eq!(validation.issues_for(IssueCategory::Status).count(), 1);
    let error = login.error.as_deref().unwrap();
    assert!(error.contains("authentication failed"));
    assert!(error.contains("validation failed"));
}

#[tokio::test]
async fn global_static_tokens_come_from_the_environment() {
    let http = MockHttpClient::default();
    let yaml = r#"
id: reports
globals:
  baseUrl: https://api.test/v2
  auth:
    static:
      reports: "${REPORTS_TOKEN}"
steps:
  - name: list
    request:
      method: get
      url: /reports
    expectations:
      status: 200
    auth:
      type: static
      namespace: reports
"#;
    let f = parse_flow_str(yaml, FlowFormat::Yaml).unwrap().flow;

    let results = orchestrator(&http, &[("REPORTS_TOKEN", "rpt-secret")])
        .run(&f, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(results[0].status, TestStatus::Passed);
    let req = &http.requests()[0];
    assert_eq!(req.method, "GET");
    assert_eq!(req.url.as_str(), "https://api.test/v2/reports");
    assert_eq!(req.headers["Authorization"], "Bearer rpt-secret");
}

#[tokio::test]
async fn unresolvable_global_token_aborts_before_any_step() {
    let http = MockHttpClient::default();
    let f = flow(
        json!([get("a", "/a", 200)]),
        json!({ "globals": { "auth": { "static": { "api": "${NOT_SET}" } } } }),
    );

    let err = orchestrator(&http, &[]).run(&f, RunOptions::default()).await.unwrap_err();

    match err {
        ExecutionError::StaticAuth(AuthError::EnvVarNotSet { var, .. }) => assert_eq!(var, "NOT_SET"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(http.requests().is_empty());
}

#[tokio::test]
async fn a_panicking_step_becomes_a_failed_result() {
    let http = MockHttpClient::default();
    let f = flow(json!([get("boom", "/boom", 200), get("after", "/after", 200)]), json!({}));

    let results = orchestrator(&http, &[]).run(&f, RunOptions::default()).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status, TestStatus::Failed);
    assert!(results[0].error.as_deref().unwrap().contains("transport exploded"));
    assert_eq!(results[1].status, TestStatus::Passed);
}

#[tokio::test(start_paused = true)]
async fn retryable_status_is_retried_then_passes() {
    let http = MockHttpClient::default();
    http.respond("/flaky", 503, json!({}));
    http.respond("/flaky", 200, json!({ "ok": true }));
    let f = flow(json!([get("flaky", "/flaky", 200)]), json!({}));

    let results = orchestrator(&http, &[]).run(&f, RunOptions::default()).await.unwrap();

    assert_eq!(results[0].status, TestStatus::Passed);
    assert_eq!(results[0].attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_validate_the_last_response() {
    let http = MockHttpClient::default();
    for _ in 0..2 {
        http.respond("/down", 503, json!({ "error": "unavailable" }));
    }
    let f = flow(
        json!([{
            "name": "down",
            "request": { "method": "GET", "url": "/down" },
            "expectations": { "status": 200 },
            "retry": { "retries": 1, "baseDelayMs": 10 }
        }]),
        json!({}),
    );

    let results = orchestrator(&http, &[]).run(&f, RunOptions::default()).await.unwrap();

    let r = &results[0];
    assert_eq!(r.status, TestStatus::Failed);
    assert_eq!(r.attempts, 2);
    assert_eq!(r.response.as_ref().unwrap().status, 503);
    assert_eq!(
        r.validation.as_ref().unwrap().issues[0].rule,
        rule_names::STATUS_CODE_MISMATCH
    );
}

#[tokio::test]
async fn an_expected_error_status_is_not_retried() {
    let http = MockHttpClient::default();
    http.respond("/maintenance", 503, json!({ "status": "maintenance" }));
    let f = flow(json!([get("maintenance", "/maintenance", 503)]), json!({}));

    let results = orchestrator(&http, &[]).run(&f, RunOptions::default()).await.unwrap();

    assert_eq!(results[0].status, TestStatus::Passed);
    assert_eq!(results[0].attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn transport_failures_exhaust_and_open_the_circuit() {
    let http = MockHttpClient::default();
    http.push("/a", Err(HttpError::Timeout));
    http.push("/a", Err(HttpError::Timeout));
    let f = flow(
        json!([get("a", "/a", 200), get("b", "/b", 200)]),
        json!({ "globals": {
            "retry": { "retries": 1, "baseDelayMs": 5 },
            "circuitBreaker": { "failureThreshold": 2, "recoveryTimeoutMs": 60000 }
        } }),
    );

    let mut orch = orchestrator(&http, &[]);
    let results = orch.run(&f, RunOptions::default()).await.unwrap();

    assert_eq!(results[0].status, TestStatus::Failed);
    assert_eq!(results[0].attempts, 2);
    assert!(results[0].response.is_none());
    assert!(results[0].error.as_deref().unwrap().contains("retry exhausted"));

    assert_eq!(results[1].status, TestStatus::Failed);
    assert_eq!(results[1].attempts, 0);
    assert!(results[1].error.as_deref().unwrap().contains("circuit breaker is open"));
    assert_eq!(http.paths(), vec!["/a", "/a"]);
    assert_eq!(orch.circuit_status().state, CircuitState::Open);

    orch.reset_circuit();
    let f = flow(json!([get("b", "/b", 200)]), json!({}));
    let results = orch.run(&f, RunOptions::default()).await.unwrap();
    assert_eq!(results[0].status, TestStatus::Passed);
}

#[tokio::test]
async fn lifecycle_events_are_emitted_in_order() {
    let http = MockHttpClient::default();
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut orch = Orchestrator::new(
        ExecutorConfig::default(),
        Arc::new(http.clone()),
        Arc::new(CollectingSink(events.clone())),
    );
    let execution_id = Uuid::new_v4();
    let f = flow(json!([get("a", "/a", 200)]), json!({}));

    orch.run(&f, RunOptions { execution_id: Some(execution_id) })
        .await
        .unwrap();

    let events = events.lock().unwrap();
    let kinds: Vec<&str> = events.iter().map(Event::kind).collect();
    assert_eq!(
        kinds,
        vec!["run.started", "step.started", "attempt.started", "step.succeeded", "run.finished"]
    );
    assert!(events
        .iter()
        .all(|e| e.to_json()["execution_id"] == execution_id.to_string()));
}

#[tokio::test]
async fn recorded_response_headers_are_redacted() {
    let http = MockHttpClient::default();
    let mut resp = response(200, json!({}));
    resp.headers.insert("Set-Cookie".to_string(), "sid=abc".to_string());
    http.push("/me", Ok(resp));
    let f = flow(json!([get("me", "/me", 200)]), json!({}));

    let results = orchestrator(&http, &[]).run(&f, RunOptions::default()).await.unwrap();

    let recorded = results[0].response.as_ref().unwrap();
    assert_eq!(recorded.headers["Set-Cookie"], REDACTED);
    let as_json = serde_json::to_value(&results[0]).unwrap();
    assert_eq!(as_json["status"], "passed");
    assert_eq!(as_json["response"]["headers"]["Set-Cookie"], REDACTED);
    assert!(as_json.get("authStatus").is_none());
}

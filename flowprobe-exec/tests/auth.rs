use std::collections::BTreeMap;
use std::time::Duration;

use flowprobe_core::types::{FlowStep, StaticTokenDecl};
use flowprobe_exec::auth::{AuthError, AuthHandler, TokenState, TokenStore};
use serde_json::json;
use tokio::time::Instant;

fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn step(auth: serde_json::Value) -> FlowStep {
    serde_json::from_value(json!({
        "name": "s",
        "request": { "method": "GET", "url": "/x" },
        "auth": auth
    }))
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn token_lifecycle_with_lazy_eviction() {
    let mut store = TokenStore::new();
    store.set_token("t1", "ns", Some(Instant::now() + Duration::from_secs(1)));
    assert_eq!(store.get_token("ns").as_deref(), Some("t1"));

    tokio::time::advance(Duration::from_millis(1500)).await;
    assert_eq!(store.get_token("ns"), None);
    assert!(store
        .get_all_tokens_info()
        .iter()
        .all(|info| info.namespace != "ns"));
}

#[test]
fn static_tokens_resolve_env_references_once() {
    let mut handler = AuthHandler::with_env(env(&[("ADMIN_TOKEN", "${OTHER}"), ("API_TOKEN", "abc")]));
    let mut decls = BTreeMap::new();
    decls.insert("admin".to_string(), StaticTokenDecl::Value("${ADMIN_TOKEN}".to_string()));
    decls.insert("api".to_string(), StaticTokenDecl::Value("${ API_TOKEN }".to_string()));
    decls.insert("plain".to_string(), StaticTokenDecl::Value("literal".to_string()));

    let loaded = handler.load_static_tokens(&decls).unwrap();
    assert_eq!(loaded, vec!["admin", "api", "plain"]);

    let store = handler.store_mut();
    assert_eq!(store.get_token("admin").as_deref(), Some("${OTHER}"));
    assert_eq!(store.get_token("api").as_deref(), Some("abc"));
    assert_eq!(store.get_token("plain").as_deref(), Some("literal"));
}

#[test]
fn missing_env_var_fails_loudly_and_loads_nothing() {
    let mut handler = AuthHandler::with_env(env(&[("PRESENT", "x")]));
    let mut decls = BTreeMap::new();
    decls.insert("a".to_string(), StaticTokenDecl::Value("${PRESENT}".to_string()));
    decls.insert(
        "b".to_string(),
        StaticTokenDecl::Detailed {
            token: "${MISSING_VAR}".to_string(),
            expires_in: Some(60),
        },
    );

    let err = handler.load_static_tokens(&decls).unwrap_err();
    assert_eq!(
        err,
        AuthError::EnvVarNotSet {
            var: "MISSING_VAR".to_string(),
            namespace: "b".to_string()
        }
    );
    assert!(err.to_string().contains("MISSING_VAR"));
    assert!(handler.store().is_empty());
}

#[tokio::test(start_paused = true)]
async fn static_step_auth_reports_missing_and_expired() {
    let mut handler = AuthHandler::with_env(env(&[]));
    let s = step(json!({ "type": "static", "namespace": "api" }));

    let err = handler.handle_step_auth(&s, None, None).unwrap_err();
    assert_eq!(err.code(), 1001);

    handler
        .store_mut()
        .set_token_with_ttl("tok", "api", Some(Duration::from_secs(10)));
    assert!(handler.handle_step_auth(&s, None, None).is_ok());

    tokio::time::advance(Duration::from_secs(10)).await;
    let err = handler.handle_step_auth(&s, None, None).unwrap_err();
    assert_eq!(err.code(), 1002);
    assert_eq!(handler.store().token_state("api"), TokenState::Missing);
}

#[test]
fn static_auth_defaults_to_the_default_namespace() {
    let mut handler = AuthHandler::with_env(env(&[]));
    handler.store_mut().set_token("tok", "default", None);
    let s = step(json!({ "type": "static" }));
    assert!(handler.handle_step_auth(&s, None, None).is_ok());
}

#[tokio::test(start_paused = true)]
async fn login_extracts_and_stores_with_ttl() {
    let mut handler = AuthHandler::with_env(env(&[]));
    let s = step(json!({
        "type": "login",
        "tokenPath": "data.tokens[0].value",
        "namespace": "billing",
        "expiresIn": 30
    }));

    let err = handler.handle_step_auth(&s, None, None).unwrap_err();
    assert_eq!(err.code(), 1006);

    let body = json!({ "data": { "tokens": [ { "value": "eyJhbGciOiJIUzI1NiJ9.abc" } ] } });
    handler.handle_step_auth(&s, Some(&body), None).unwrap();

    let info = handler.get_all_tokens_status();
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].namespace, "billing");
    assert_eq!(info[0].masked_value, "eyJh****");
    assert_eq!(info[0].expires_in_ms, Some(30_000));

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(!handler.store_mut().has_valid_token("billing"));
}

#[test]
fn login_with_null_token_names_the_path() {
    let mut handler = AuthHandler::with_env(env(&[]));
    let s = step(json!({ "type": "login", "tokenPath": "auth.token" }));
    let err = handler
        .handle_step_auth(&s, Some(&json!({ "auth": { "token": null } })), None)
        .unwrap_err();
    assert_eq!(err.code(), 1003);
    assert!(err.to_string().contains("auth.token"));
    assert!(handler.store().is_empty());
}

#[test]
fn steps_without_auth_always_succeed() {
    let mut handler = AuthHandler::with_env(env(&[]));
    let s: FlowStep = serde_json::from_value(json!({
        "name": "plain",
        "request": { "method": "GET", "url": "/health" }
    }))
    .unwrap();
    assert!(handler.handle_step_auth(&s, None, None).is_ok());
}

//! End-to-end tests for the pinchat request pipeline.
//!
//! These drive the real router and the real HTTP adapter against an
//! in-process stub LLM service, from PIN login to reply and usage count.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::{Json, Router, extract::State, routing::post};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use pinchat_adapter::HttpAdapter;
use pinchat_config::AppConfig;
use pinchat_gateway::{GatewayState, SharedState, build_router};

// ── Stub LLM service ─────────────────────────────────────────────────────

/// What the stub does with the next request.
#[derive(Clone)]
enum StubAction {
    Reply(Value),
    Hang,
}

#[derive(Default)]
struct StubState {
    script: Mutex<VecDeque<StubAction>>,
    received: Mutex<Vec<Value>>,
}

async fn stub_generate(State(stub): State<Arc<StubState>>, Json(body): Json<Value>) -> Json<Value> {
    stub.received.lock().unwrap().push(body);
    let action = stub
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(StubAction::Reply(json!({"text": "ok", "model_used": "stub-1"})));
    match action {
        StubAction::Reply(value) => Json(value),
        StubAction::Hang => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"text": "too late", "model_used": "stub-1"}))
        }
    }
}

async fn spawn_stub(actions: Vec<StubAction>) -> (String, Arc<StubState>) {
    let stub = Arc::new(StubState {
        script: Mutex::new(actions.into()),
        received: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/llm/generate", post(stub_generate))
        .with_state(stub.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/llm/generate"), stub)
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn config_for(url: &str, dir: &TempDir) -> AppConfig {
    AppConfig {
        pin: "1357".into(),
        app_name: "Kitchen Helper".into(),
        daily_limit: 3,
        cooldown_seconds: 0,
        max_input_chars: 500,
        max_context_messages: 10,
        llm_adapter_url: url.into(),
        session_ttl_hours: 1,
        system_prompt: Some("You are {app_name}.".into()),
        timezone: "UTC".into(),
        llm_timeout_seconds: 1,
        ledger_path: dir.path().join("data").join("usage.json"),
        ..AppConfig::default()
    }
}

fn gateway(config: AppConfig, timeout: Duration) -> SharedState {
    let adapter = HttpAdapter::new(config.llm_adapter_url.clone(), timeout).unwrap();
    Arc::new(GatewayState::new(config, Arc::new(adapter)).unwrap())
}

async fn login(app: &Router, pin: &str) -> (StatusCode, Option<String>) {
    let req = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("pin={pin}")))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().split(';').next().unwrap().to_string());
    (response.status(), cookie)
}

async fn chat(app: &Router, cookie: &str, input: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie)
        .body(Body::from(json!({ "input": input }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

fn today(state: &SharedState) -> u64 {
    state.ledger.daily_count(chrono::Utc::now())
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_login_chat_and_count() {
    let (url, stub) = spawn_stub(vec![StubAction::Reply(
        json!({"text": "Pasta tonight?", "model_used": "stub-large"}),
    )])
    .await;
    let dir = TempDir::new().unwrap();
    let state = gateway(config_for(&url, &dir), Duration::from_secs(2));
    let app = build_router(state.clone());

    let (status, cookie) = login(&app, "1357").await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let cookie = cookie.unwrap();

    let (status, body) = chat(&app, &cookie, "What should we cook?").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Pasta tonight?");
    assert_eq!(body["model_used"], "stub-large");
    assert_eq!(today(&state), 1);

    let received = stub.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let messages = received[0]["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], "You are Kitchen Helper.");
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "What should we cook?");
    assert_eq!(received[0]["max_tokens"], 600);

    // The ledger file is real JSON on disk.
    let raw = std::fs::read_to_string(dir.path().join("data").join("usage.json")).unwrap();
    let ledger: Value = serde_json::from_str(&raw).unwrap();
    assert!(ledger.is_object());
}

#[tokio::test]
async fn e2e_timeout_keeps_message_and_skips_count() {
    let (url, stub) = spawn_stub(vec![
        StubAction::Hang,
        StubAction::Reply(json!({"text": "Back again", "model_used": "stub-1"})),
    ])
    .await;
    let dir = TempDir::new().unwrap();
    let state = gateway(config_for(&url, &dir), Duration::from_millis(300));
    let app = build_router(state.clone());
    let (_, cookie) = login(&app, "1357").await;
    let cookie = cookie.unwrap();

    let (status, body) = chat(&app, &cookie, "first try").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "llm_unreachable");
    assert_eq!(today(&state), 0);

    let (status, body) = chat(&app, &cookie, "second try").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Back again");
    assert_eq!(today(&state), 1);

    // The unanswered message is still part of the context.
    let received = stub.received.lock().unwrap();
    let contents: Vec<&str> = received[1]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["role"] == "user")
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["first try", "second try"]);
}

#[tokio::test]
async fn e2e_in_band_error_is_surfaced() {
    let (url, _stub) = spawn_stub(vec![
        StubAction::Reply(json!({"error_type": "quota_exceeded"})),
        StubAction::Reply(json!({"text": "   "})),
    ])
    .await;
    let dir = TempDir::new().unwrap();
    let state = gateway(config_for(&url, &dir), Duration::from_secs(2));
    let app = build_router(state.clone());
    let (_, cookie) = login(&app, "1357").await;
    let cookie = cookie.unwrap();

    let (status, body) = chat(&app, &cookie, "hello").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "quota_exceeded");

    let (status, body) = chat(&app, &cookie, "hello again").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "llm_invalid");
    assert_eq!(today(&state), 0);
}

#[tokio::test]
async fn e2e_daily_limit_is_enforced() {
    let (url, stub) = spawn_stub(Vec::new()).await;
    let dir = TempDir::new().unwrap();
    let state = gateway(config_for(&url, &dir), Duration::from_secs(2));
    let app = build_router(state.clone());
    let (_, cookie) = login(&app, "1357").await;
    let cookie = cookie.unwrap();

    for i in 0..3 {
        let (status, _) = chat(&app, &cookie, &format!("message {i}")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = chat(&app, &cookie, "one more").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "daily_limit");
    assert_eq!(stub.received.lock().unwrap().len(), 3);
    assert_eq!(today(&state), 3);
}

#[tokio::test]
async fn e2e_unreachable_adapter() {
    // Bind then drop a listener so the port is closed.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = TempDir::new().unwrap();
    let url = format!("http://{addr}/llm/generate");
    let state = gateway(config_for(&url, &dir), Duration::from_secs(2));
    let app = build_router(state.clone());
    let (_, cookie) = login(&app, "1357").await;

    let (status, body) = chat(&app, &cookie.unwrap(), "anyone there?").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "llm_unreachable");
    assert_eq!(today(&state), 0);
}

#[tokio::test]
async fn e2e_lockout_persists_across_restart() {
    let (url, _stub) = spawn_stub(Vec::new()).await;
    let dir = TempDir::new().unwrap();

    {
        let state = gateway(config_for(&url, &dir), Duration::from_secs(2));
        let app = build_router(state);
        for _ in 0..5 {
            let (status, cookie) = login(&app, "0000").await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(cookie.is_none());
        }
    }

    // A fresh process state reading the same ledger is still locked.
    let state = gateway(config_for(&url, &dir), Duration::from_secs(2));
    let app = build_router(state);
    let (status, cookie) = login(&app, "1357").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(cookie.is_none());
}

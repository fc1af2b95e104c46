use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use chat_relay::AppState;
use chat_relay::chat::ChatHandler;
use chat_relay::config::{
    AppConfig, GeneratorBackend, GeneratorConfig, ServerConfig, SessionsConfig,
};
use chat_relay::llm::{
    DEFAULT_MODEL, EchoGenerator, GenerationError, GeneratorRegistry, ResponseGenerator, Turn,
};
use chat_relay::server::build_router;
use chat_relay::session::SessionStore;
use serde_json::{Value, json};

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_secs: 30,
            body_limit_bytes: 1024 * 1024,
        },
        sessions: SessionsConfig {
            max_sessions: None,
            idle_ttl_secs: None,
            sweep_interval_secs: 60,
        },
        generator: GeneratorConfig {
            backend: GeneratorBackend::Echo,
            ..GeneratorConfig::default()
        },
    }
}

#[derive(Debug)]
struct Failing;

#[async_trait::async_trait]
impl ResponseGenerator for Failing {
    async fn generate(
        &self,
        _message: &str,
        _model: &str,
        _history: &[Turn],
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Transient("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[derive(Debug)]
struct Stalled;

#[async_trait::async_trait]
impl ResponseGenerator for Stalled {
    async fn generate(
        &self,
        _message: &str,
        _model: &str,
        _history: &[Turn],
    ) -> Result<String, GenerationError> {
        std::future::pending().await
    }

    fn name(&self) -> &'static str {
        "stalled"
    }
}

fn server() -> TestServer {
    let state = AppState::from_config(Arc::new(test_config()));
    TestServer::new(build_router(state)).unwrap()
}

fn server_with_failing_model() -> TestServer {
    let registry = GeneratorRegistry::new()
        .with_generator(DEFAULT_MODEL, Arc::new(EchoGenerator))
        .with_generator("broken", Arc::new(Failing));
    let handler = ChatHandler::new(SessionStore::new(), registry);
    let state = AppState::with_handler(Arc::new(test_config()), handler);
    TestServer::new(build_router(state)).unwrap()
}

#[tokio::test]
async fn test_new_session_gets_echo_pair() {
    let server = server();

    let response = server
        .post("/chat")
        .json(&json!({ "session_id": "s1", "message": "hi", "model": "liteLLM" }))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({
        "reply": "Echo: hi",
        "conversation": [
            { "role": "user", "content": "hi" },
            { "role": "assistant", "content": "Echo: hi" }
        ]
    }));
}

#[tokio::test]
async fn test_model_defaults_to_litellm() {
    let server = server();

    let response = server
        .post("/chat")
        .json(&json!({ "session_id": "s1", "message": "hi" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["reply"], "Echo: hi");
}

#[tokio::test]
async fn test_null_model_is_unsupported() {
    let server = server();

    let response = server
        .post("/chat")
        .json(&json!({ "session_id": "s1", "message": "hi", "model": null }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "detail": "Unsupported model" }));

    server
        .get("/sessions/s1")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_chat_body_is_400_with_detail() {
    let server = server();

    let response = server
        .post("/chat")
        .json(&json!({ "session_id": "s1" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let detail = response.json::<Value>()["detail"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(detail.contains("message"), "{detail}");
}

#[tokio::test]
async fn test_second_call_continues_conversation() {
    let server = server();

    let first: Value = server
        .post("/chat")
        .json(&json!({ "session_id": "s1", "message": "hi", "model": "liteLLM" }))
        .await
        .json();

    let second: Value = server
        .post("/chat")
        .json(&json!({ "session_id": "s1", "message": "again", "model": "liteLLM" }))
        .await
        .json();

    let conversation = second["conversation"].as_array().unwrap();
    assert_eq!(conversation.len(), 4);
    assert_eq!(
        conversation[..2],
        first["conversation"].as_array().unwrap()[..]
    );
    assert_eq!(conversation[2], json!({ "role": "user", "content": "again" }));
    assert_eq!(
        conversation[3],
        json!({ "role": "assistant", "content": "Echo: again" })
    );
}

#[tokio::test]
async fn test_unsupported_model_is_rejected_without_mutation() {
    let server = server();

    server
        .post("/chat")
        .json(&json!({ "session_id": "s1", "message": "hi", "model": "liteLLM" }))
        .await
        .assert_status_ok();

    let response = server
        .post("/chat")
        .json(&json!({ "session_id": "s1", "message": "x", "model": "gpt-unknown" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "detail": "Unsupported model" }));

    let session: Value = server.get("/sessions/s1").await.json();
    assert_eq!(session["conversation"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let server = server();

    for message in ["one", "two", "three"] {
        server
            .post("/chat")
            .json(&json!({ "session_id": "a", "message": message }))
            .await
            .assert_status_ok();
    }
    let b: Value = server
        .post("/chat")
        .json(&json!({ "session_id": "b", "message": "solo" }))
        .await
        .json();

    let conversation = b["conversation"].as_array().unwrap();
    assert_eq!(conversation.len(), 2);
    assert!(
        conversation
            .iter()
            .all(|turn| !turn["content"].as_str().unwrap().contains("one"))
    );

    let a: Value = server.get("/sessions/a").await.json();
    assert_eq!(a["conversation"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_generator_failure_returns_500_and_keeps_user_turn() {
    let server = server_with_failing_model();

    server
        .post("/chat")
        .json(&json!({ "session_id": "s1", "message": "hi" }))
        .await
        .assert_status_ok();

    let response = server
        .post("/chat")
        .json(&json!({ "session_id": "s1", "message": "boom", "model": "broken" }))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({ "detail": "LLM API error: connection refused" }));

    let session: Value = server.get("/sessions/s1").await.json();
    let conversation = session["conversation"].as_array().unwrap();
    assert_eq!(conversation.len(), 3);
    assert_eq!(
        conversation[2],
        json!({ "role": "user", "content": "boom" })
    );
}

#[tokio::test]
async fn test_reset_forgets_session() {
    let server = server();

    server
        .post("/chat")
        .json(&json!({ "session_id": "s1", "message": "hi" }))
        .await
        .assert_status_ok();

    let response = server
        .post("/reset")
        .json(&json!({ "session_id": "s1" }))
        .await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "session reset" }));

    server
        .get("/sessions/s1")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let fresh: Value = server
        .post("/chat")
        .json(&json!({ "session_id": "s1", "message": "back" }))
        .await
        .json();
    assert_eq!(fresh["conversation"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_reset_requires_session_id() {
    let server = server();

    let response = server.post("/reset").json(&json!({})).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "detail": "session_id is required." }));

    server
        .post("/reset")
        .json(&json!({ "session_id": "" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = server.post("/reset").json(&json!({ "session_id": 5 })).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "detail": "session_id is required." }));
}

#[tokio::test]
async fn test_slow_request_times_out_with_json_detail() {
    let mut config = test_config();
    config.server.request_timeout_secs = 1;
    let registry = GeneratorRegistry::new().with_generator(DEFAULT_MODEL, Arc::new(Stalled));
    let handler = ChatHandler::new(SessionStore::new(), registry);
    let state = AppState::with_handler(Arc::new(config), handler);
    let server = TestServer::new(build_router(state)).unwrap();

    let response = server
        .post("/chat")
        .json(&json!({ "session_id": "s1", "message": "hi" }))
        .await;
    response.assert_status(StatusCode::REQUEST_TIMEOUT);
    response.assert_json(&json!({ "detail": "Request timed out" }));
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let server = server();

    let response = server.get("/sessions/nope").await;
    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_json(&json!({ "detail": "Session not found" }));
}

#[tokio::test]
async fn test_index_page_posts_to_chat() {
    let server = server();

    let response = server.get("/").await;
    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("<!DOCTYPE html>"));
    assert!(html.contains("\"/chat\""));
}

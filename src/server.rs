use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Request, State, rejection::JsonRejection},
    middleware::Next,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::AppState;
use crate::chat::{ChatError, ChatOutcome};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::llm::{DEFAULT_MODEL, Turn};
use crate::session::SessionStore;

/// Start the HTTP server and run until Ctrl-C.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let state = AppState::from_config(Arc::clone(&config));

    info!(
        name: "generator.models",
        models = ?state.chat.generators().models(),
        backend = config.generator.backend.as_str(),
        "Supported models"
    );

    let sweeper = spawn_eviction_sweeper(
        state.chat.sessions().clone(),
        config.sessions.sweep_interval(),
    );

    let app = build_router(state);

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

/// Build the application router with all middleware applied.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .route("/", get(index_handler))
        .route("/chat", post(api_chat))
        .route("/reset", post(api_reset))
        .route("/sessions/{id}", get(api_get_session))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(axum::middleware::from_fn(
                    move |req: Request, next: Next| async move {
                        match tokio::time::timeout(timeout, next.run(req)).await {
                            Ok(res) => res,
                            Err(_elapsed) => ApiError::RequestTimeout.into_response(),
                        }
                    },
                )),
        )
        .with_state(state)
}

/// Periodically apply the store's eviction policy.
///
/// Returns `None` when the policy never evicts.
pub fn spawn_eviction_sweeper(store: SessionStore, every: Duration) -> Option<JoinHandle<()>> {
    if store.policy().is_unbounded() {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let evicted = store.evict_if_needed();
            if evicted > 0 {
                debug!(
                    name: "session.sweep",
                    evicted,
                    remaining = store.len(),
                    "Evicted idle sessions"
                );
            }
        }
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!(name: "server.shutdown", "Shutdown signal received");
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Index page handler.
async fn index_handler() -> impl IntoResponse {
    Html(include_str!("../static/index.html"))
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for chat API.
#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// Client-chosen session id.
    session_id: String,
    /// User message content.
    message: String,
    /// Model name; `liteLLM` when absent. An explicit null names no model.
    #[serde(default = "default_model")]
    model: Option<String>,
}

fn default_model() -> Option<String> {
    Some(DEFAULT_MODEL.to_string())
}

/// POST /chat - Append a message and reply to the session transcript.
async fn api_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatOutcome>, ApiError> {
    let Json(req) = payload?;
    let model = req
        .model
        .as_deref()
        .ok_or_else(|| ChatError::UnsupportedModel("null".to_string()))?;
    debug!(
        session_id = %req.session_id,
        model = %model,
        "Received chat request"
    );

    let outcome = state
        .chat
        .handle(&req.session_id, &req.message, model)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    status: &'static str,
}

/// POST /reset - Forget a session.
///
/// Any body without a non-empty string `session_id` is rejected.
async fn api_reset(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ResetResponse>, ApiError> {
    let Json(body) = payload?;
    let session_id = body
        .get("session_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("session_id is required.".to_string()))?;

    state.chat.reset(session_id);
    Ok(Json(ResetResponse {
        status: "session reset",
    }))
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    session_id: String,
    conversation: Vec<Turn>,
}

/// GET /sessions/{id} - Read a session transcript.
async fn api_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let conversation = state
        .chat
        .conversation(&id)
        .await
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    Ok(Json(SessionResponse {
        session_id: id,
        conversation,
    }))
}

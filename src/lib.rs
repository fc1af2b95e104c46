//! Chat Relay
//!
//! A small web chat relay: `POST /chat` records a user message in a
//! per-session transcript, asks a response generator for a reply, records
//! the reply and returns the whole conversation.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP server serving the JSON API and a static page
//! - **Chat Handler**: one request/response cycle per call, atomic per session
//! - **Sessions**: in-memory transcripts keyed by client-supplied id
//! - **Generators**: pluggable reply backends selected by model name
//!
//! # Modules
//!
//! - [`chat`]: request orchestration
//! - [`config`]: layered configuration (defaults, file, env, CLI)
//! - [`llm`]: response generator trait and implementations
//! - [`session`]: session store and eviction policy

#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::unused_async)]

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod server;
pub mod session;
pub mod telemetry;

use crate::config::AppConfig;

use chat::ChatHandler;
use llm::GeneratorRegistry;
use session::SessionStore;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Chat handler owning the session store and generators.
    pub chat: Arc<ChatHandler>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Build the session store and generator registry from configuration.
    #[must_use]
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        let sessions = SessionStore::with_policy(config.sessions.eviction_policy());
        let generators = GeneratorRegistry::from_config(&config.generator);
        Self::with_handler(config, ChatHandler::new(sessions, generators))
    }

    /// Use a prepared chat handler.
    #[must_use]
    pub fn with_handler(config: Arc<AppConfig>, chat: ChatHandler) -> Self {
        Self {
            chat: Arc::new(chat),
            config,
        }
    }
}

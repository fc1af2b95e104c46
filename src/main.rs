//! Chat Relay Server
//!
//! Entry point: loads configuration, sets up logging and serves the API.

use std::sync::Arc;

use chat_relay::config::AppConfig;
use chat_relay::{server, telemetry};
use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tracing::info;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before reading env-backed config
    let _ = dotenv();

    telemetry::init();

    let config = match AppConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    info!(
        name: "config.loaded",
        addr = %config.server.addr(),
        max_sessions = ?config.sessions.max_sessions,
        idle_ttl_secs = ?config.sessions.idle_ttl_secs,
        "Configuration loaded"
    );

    server::start_server(config).await
}

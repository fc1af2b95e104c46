//! Layered application configuration.
//!
//! Priority, lowest first: built-in defaults, config file, `RELAY_`
//! environment variables (`RELAY_SERVER__PORT=9000`), CLI flags.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::llm::RetryPolicy;
use crate::session::EvictionPolicy;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path (YAML, TOML or JSON)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Backend serving the default model
    #[arg(long, value_enum)]
    pub generator_backend: Option<GeneratorBackend>,

    /// Maximum number of sessions kept in memory
    #[arg(long)]
    pub max_sessions: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    /// Sessions beyond this count are evicted least-recently-used first.
    #[serde(default)]
    pub max_sessions: Option<usize>,
    /// Sessions idle longer than this are evicted by the sweeper.
    #[serde(default)]
    pub idle_ttl_secs: Option<u64>,
    pub sweep_interval_secs: u64,
}

impl SessionsConfig {
    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            max_sessions: self.max_sessions,
            idle_ttl: self.idle_ttl_secs.map(Duration::from_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Which implementation serves the default model.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    /// Reply with `Echo: <message>`.
    #[default]
    Echo,
    /// Forward the transcript to an HTTP completion endpoint.
    Http,
}

impl GeneratorBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Echo => "echo",
            Self::Http => "http",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeneratorConfig {
    pub backend: GeneratorBackend,
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: GeneratorBackend::Echo,
            base_url: "https://api.liteLLM.com/generate".to_string(),
            api_key: None,
            max_tokens: 150,
            temperature: 0.7,
            timeout_secs: 10,
            max_retries: 2,
            retry_backoff_ms: 200,
        }
    }
}

impl GeneratorConfig {
    /// Deadline for a whole generation call, retries included.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Deadline for one backend request, so every allowed attempt fits
    /// inside [`Self::timeout`].
    pub fn attempt_timeout(&self) -> Duration {
        self.timeout() / self.max_retries.saturating_add(1)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
            timeout: self.timeout(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("server.body_limit_bytes", 1024 * 1024)?
            .set_default("sessions.max_sessions", 10_000)?
            .set_default("sessions.sweep_interval_secs", 60)?;

        // Explicit file must exist; ./config.{yaml,toml,json} is optional.
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(backend) = cli.generator_backend {
            builder = builder.set_override("generator.backend", backend.as_str())?;
        }
        if let Some(max) = cli.max_sessions {
            let max = i64::try_from(max).unwrap_or(i64::MAX);
            builder = builder.set_override("sessions.max_sessions", max)?;
        }

        builder.build()?.try_deserialize()
    }
}

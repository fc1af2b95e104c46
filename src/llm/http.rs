//! Text-completion backend reached over HTTP.
//!
//! Sends the whole transcript as a single `User: ... / Assistant: ...` prompt
//! and reads the completion from the `text` field of the JSON response.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};

use super::{GenerationError, ResponseGenerator, Turn};

/// Connection and sampling settings for [`HttpCompletionGenerator`].
#[derive(Debug, Clone)]
pub struct HttpGeneratorSettings {
    /// Full URL of the completion endpoint.
    pub url: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// Generator backed by an HTTP completion endpoint.
#[derive(Clone)]
pub struct HttpCompletionGenerator {
    http: reqwest::Client,
    settings: HttpGeneratorSettings,
}

impl std::fmt::Debug for HttpCompletionGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompletionGenerator")
            .field("url", &self.settings.url)
            .field("max_tokens", &self.settings.max_tokens)
            .finish()
    }
}

impl HttpCompletionGenerator {
    /// Create a generator with the given settings.
    #[must_use]
    pub fn new(settings: HttpGeneratorSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }
}

/// Render the transcript as a completion prompt ending in `Assistant:`.
#[must_use]
pub fn render_prompt(history: &[Turn]) -> String {
    let mut prompt = String::new();
    for turn in history {
        prompt.push_str(turn.role.label());
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }
    prompt.push_str("Assistant:");
    prompt
}

fn classify_transport(err: &reqwest::Error) -> GenerationError {
    if err.is_builder() {
        GenerationError::Permanent(err.to_string())
    } else {
        GenerationError::Transient(err.to_string())
    }
}

fn classify_status(status: StatusCode) -> GenerationError {
    let msg = format!("backend returned {status}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        GenerationError::Transient(msg)
    } else {
        GenerationError::Permanent(msg)
    }
}

#[async_trait::async_trait]
impl ResponseGenerator for HttpCompletionGenerator {
    async fn generate(
        &self,
        _message: &str,
        model: &str,
        history: &[Turn],
    ) -> Result<String, GenerationError> {
        let body = json!({
            "prompt": render_prompt(history),
            "model": model,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
        });

        let mut rb = self
            .http
            .post(&self.settings.url)
            .timeout(self.settings.request_timeout)
            .json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp = rb.send().await.map_err(|e| classify_transport(&e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| GenerationError::Permanent(e.to_string()))?;

        let reply = data
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim();
        if reply.is_empty() {
            return Err(GenerationError::Permanent(
                "Empty response from LLM.".to_string(),
            ));
        }

        Ok(reply.to_string())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

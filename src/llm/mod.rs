//! Response generation.
//!
//! The chat handler never talks to a model backend directly. It goes through
//! the [`ResponseGenerator`] trait, and the [`GeneratorRegistry`] decides
//! which implementation serves a given `model` name.
//!
//! # Generators
//!
//! - [`EchoGenerator`]: placeholder that echoes the user's message
//! - [`HttpCompletionGenerator`]: POSTs a text prompt to a completion endpoint
//! - [`GuardedGenerator`]: wraps another generator with retries and a timeout

pub mod echo;
pub mod guard;
pub mod http;
pub mod registry;

pub use echo::EchoGenerator;
pub use guard::{GuardedGenerator, RetryPolicy};
pub use http::HttpCompletionGenerator;
pub use registry::{DEFAULT_MODEL, GeneratorRegistry};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message sent by the client.
    User,
    /// Reply produced by a generator.
    Assistant,
}

impl Role {
    /// Label used when rendering a transcript as a text prompt.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Author of the turn.
    pub role: Role,
    /// Text content, unvalidated.
    pub content: String,
}

impl Turn {
    /// Create a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Errors a generator can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Failure that may succeed on retry (network, 5xx, rate limiting).
    #[error("LLM API error: {0}")]
    Transient(String),

    /// Failure that will not go away by retrying.
    #[error("LLM API error: {0}")]
    Permanent(String),

    /// The backend did not answer in time.
    #[error("LLM API error: generation timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
}

impl GenerationError {
    /// Whether the guard may retry this error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Capability that turns a user message into an assistant reply.
///
/// `history` is the transcript as it stands when the call is made, so its
/// last turn is the user message being answered.
#[async_trait::async_trait]
pub trait ResponseGenerator: Send + Sync + std::fmt::Debug {
    /// Produce a reply for `message`.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] when the backend fails.
    async fn generate(
        &self,
        message: &str,
        model: &str,
        history: &[Turn],
    ) -> Result<String, GenerationError>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_serializes_lowercase_role() {
        let json = serde_json::to_value(Turn::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));

        let json = serde_json::to_value(Turn::assistant("yo")).unwrap();
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn test_error_display_and_kind() {
        let err = GenerationError::Permanent("Empty response from LLM.".to_string());
        assert_eq!(err.to_string(), "LLM API error: Empty response from LLM.");
        assert!(!err.is_transient());

        assert!(GenerationError::Transient("503".to_string()).is_transient());
        assert!(!GenerationError::Timeout(Duration::from_secs(1)).is_transient());
    }
}

//! One request/response cycle of the chat relay.

use serde::Serialize;
use tracing::{info, warn};

use crate::llm::{GenerationError, GeneratorRegistry, Turn};
use crate::session::SessionStore;

/// Result of a successful chat call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatOutcome {
    /// The assistant reply just produced.
    pub reply: String,
    /// The whole transcript, reply included.
    pub conversation: Vec<Turn>,
}

/// Errors from [`ChatHandler::handle`].
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The requested model has no registered generator.
    #[error("Unsupported model")]
    UnsupportedModel(String),

    /// The generator failed or timed out.
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Appends user and assistant turns to session transcripts.
#[derive(Debug, Clone)]
pub struct ChatHandler {
    sessions: SessionStore,
    generators: GeneratorRegistry,
}

impl ChatHandler {
    #[must_use]
    pub fn new(sessions: SessionStore, generators: GeneratorRegistry) -> Self {
        Self {
            sessions,
            generators,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn generators(&self) -> &GeneratorRegistry {
        &self.generators
    }

    /// Record `message`, generate a reply and record it.
    ///
    /// The user turn and the assistant turn are appended inside the
    /// session's critical section, so concurrent calls on one session never
    /// interleave their pairs. An unsupported model is rejected before the
    /// session is touched. When generation fails the user turn stays in the
    /// transcript with no reply after it.
    ///
    /// # Errors
    ///
    /// [`ChatError::UnsupportedModel`] or [`ChatError::Generation`].
    pub async fn handle(
        &self,
        session_id: &str,
        message: &str,
        model: &str,
    ) -> Result<ChatOutcome, ChatError> {
        let generator = self
            .generators
            .get(model)
            .ok_or_else(|| ChatError::UnsupportedModel(model.to_string()))?;

        let session = self.sessions.get_or_create(session_id);
        let mut transcript = session.lock().await;
        transcript.push(Turn::user(message));

        let reply = match generator
            .generate(message, model, transcript.turns())
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    name: "chat.generation.failed",
                    session_id = %session_id,
                    model = %model,
                    error = %e,
                    "Generation failed, user turn left unanswered"
                );
                return Err(e.into());
            }
        };

        transcript.push(Turn::assistant(reply.clone()));

        info!(
            name: "chat.turn.completed",
            session_id = %session_id,
            model = %model,
            generator = generator.name(),
            turns = transcript.len(),
            "Chat turn completed"
        );

        Ok(ChatOutcome {
            reply,
            conversation: transcript.turns().to_vec(),
        })
    }

    /// Current turns of a session, if it exists.
    pub async fn conversation(&self, session_id: &str) -> Option<Vec<Turn>> {
        match self.sessions.get(session_id) {
            Some(session) => Some(session.turns().await),
            None => None,
        }
    }

    /// Forget a session. Returns whether it existed.
    pub fn reset(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        info!(
            name: "chat.session.reset",
            session_id = %session_id,
            existed = removed,
            "Session reset"
        );
        removed
    }
}

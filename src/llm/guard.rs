//! Retry and timeout wrapper for generators.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::{GenerationError, ResponseGenerator, Turn};

/// How a [`GuardedGenerator`] retries and bounds calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one, for transient errors only.
    pub max_retries: u32,
    /// Pause between attempts.
    pub backoff: Duration,
    /// Deadline for the whole call, retries included.
    pub timeout: Duration,
}

/// Wraps a generator with bounded retries and an overall deadline.
///
/// A call that exceeds [`RetryPolicy::timeout`] fails with
/// [`GenerationError::Timeout`].
#[derive(Debug, Clone)]
pub struct GuardedGenerator {
    inner: Arc<dyn ResponseGenerator>,
    policy: RetryPolicy,
}

impl GuardedGenerator {
    /// Wrap `inner` with `policy`.
    #[must_use]
    pub fn new(inner: Arc<dyn ResponseGenerator>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn generate_with_retries(
        &self,
        message: &str,
        model: &str,
        history: &[Turn],
    ) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(message, model, history).await {
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    warn!(
                        name: "generator.retry",
                        generator = self.inner.name(),
                        attempt,
                        error = %e,
                        "Transient generation failure, retrying"
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait::async_trait]
impl ResponseGenerator for GuardedGenerator {
    async fn generate(
        &self,
        message: &str,
        model: &str,
        history: &[Turn],
    ) -> Result<String, GenerationError> {
        tokio::time::timeout(
            self.policy.timeout,
            self.generate_with_retries(message, model, history),
        )
        .await
        .map_err(|_elapsed| GenerationError::Timeout(self.policy.timeout))?
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

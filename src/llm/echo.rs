//! Placeholder generator that echoes the user's message.

use super::{GenerationError, ResponseGenerator, Turn};

/// Generator that replies with `Echo: <message>`.
///
/// Stands in for a real model until a backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoGenerator;

#[async_trait::async_trait]
impl ResponseGenerator for EchoGenerator {
    async fn generate(
        &self,
        message: &str,
        _model: &str,
        _history: &[Turn],
    ) -> Result<String, GenerationError> {
        Ok(format!("Echo: {message}"))
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_reply() {
        let reply = EchoGenerator
            .generate("hi", "liteLLM", &[Turn::user("hi")])
            .await
            .unwrap();
        assert_eq!(reply, "Echo: hi");
    }

    #[tokio::test]
    async fn test_echo_keeps_content_verbatim() {
        let reply = EchoGenerator.generate("", "liteLLM", &[]).await.unwrap();
        assert_eq!(reply, "Echo: ");

        let reply = EchoGenerator
            .generate("  multi\nline ", "liteLLM", &[])
            .await
            .unwrap();
        assert_eq!(reply, "Echo:   multi\nline ");
    }
}

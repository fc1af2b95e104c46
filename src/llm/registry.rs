//! Model name to generator mapping.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::http::HttpGeneratorSettings;
use super::{
    EchoGenerator, GuardedGenerator, HttpCompletionGenerator, ResponseGenerator, RetryPolicy,
};
use crate::config::{GeneratorBackend, GeneratorConfig};

/// Model used when a request does not name one.
pub const DEFAULT_MODEL: &str = "liteLLM";

/// Registry of generators keyed by model name.
///
/// The set of registered names is the set of supported models.
#[derive(Debug, Clone, Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn ResponseGenerator>>,
}

impl GeneratorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry described by the configuration.
    ///
    /// [`DEFAULT_MODEL`] is served by the configured backend, wrapped in a
    /// [`GuardedGenerator`].
    #[must_use]
    pub fn from_config(config: &GeneratorConfig) -> Self {
        let backend: Arc<dyn ResponseGenerator> = match config.backend {
            GeneratorBackend::Echo => Arc::new(EchoGenerator),
            GeneratorBackend::Http => Arc::new(HttpCompletionGenerator::new(HttpGeneratorSettings {
                url: config.base_url.clone(),
                api_key: config.api_key.clone(),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                request_timeout: config.attempt_timeout(),
            })),
        };

        info!(
            name: "generator.registered",
            model = DEFAULT_MODEL,
            backend = backend.name(),
            "Generator registered"
        );

        let guarded = GuardedGenerator::new(backend, config.retry_policy());
        Self::new().with_generator(DEFAULT_MODEL, Arc::new(guarded))
    }

    /// Register `generator` under `model`, replacing any previous entry.
    #[must_use]
    pub fn with_generator(
        mut self,
        model: impl Into<String>,
        generator: Arc<dyn ResponseGenerator>,
    ) -> Self {
        self.generators.insert(model.into(), generator);
        self
    }

    /// Look up the generator for `model`.
    #[must_use]
    pub fn get(&self, model: &str) -> Option<Arc<dyn ResponseGenerator>> {
        self.generators.get(model).cloned()
    }

    /// Whether `model` is supported.
    #[must_use]
    pub fn supports(&self, model: &str) -> bool {
        self.generators.contains_key(model)
    }

    /// Supported model names, sorted.
    #[must_use]
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.generators.keys().cloned().collect();
        names.sort();
        names
    }
}

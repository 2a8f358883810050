//! LLM inference adapter - Implements InferencePort using ai_core

use std::sync::Arc;
use std::time::Instant;

use ai_core::{InferenceEngine, InferenceError, InferenceRequest, LlmConfig, ProviderEngine};
use application::{
    error::ApplicationError,
    ports::{ComposedPrompt, InferencePort, ReplyFragments},
};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, future};
use tracing::{debug, instrument};

/// Adapter over any hosted provider engine
#[derive(Clone)]
pub struct LlmInferenceAdapter {
    engine: Arc<dyn InferenceEngine>,
}

impl std::fmt::Debug for LlmInferenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmInferenceAdapter")
            .field("provider", &self.engine.provider_name())
            .field("model", &self.engine.default_model())
            .finish()
    }
}

impl LlmInferenceAdapter {
    #[must_use]
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self { engine }
    }

    /// Build the provider engine named by `config`
    ///
    /// # Errors
    ///
    /// Returns `ApplicationError::Configuration` for an unusable provider
    /// setup. No request is sent.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ApplicationError> {
        let engine = ProviderEngine::from_config(config).map_err(Self::map_error)?;
        Ok(Self::new(Arc::new(engine)))
    }

    fn map_error(e: InferenceError) -> ApplicationError {
        match e {
            InferenceError::Configuration(msg) => ApplicationError::Configuration(msg),
            other => ApplicationError::Inference(other.to_string()),
        }
    }

    fn request(prompt: &ComposedPrompt) -> InferenceRequest {
        let request = if prompt.system.is_empty() {
            InferenceRequest::simple(&prompt.prompt)
        } else {
            InferenceRequest::with_system(&prompt.system, &prompt.prompt)
        };
        request.with_history(&prompt.history)
    }
}

#[async_trait]
impl InferencePort for LlmInferenceAdapter {
    #[instrument(skip(self, prompt), fields(provider = %self.engine.provider_name(), history = prompt.history.len()))]
    async fn complete(&self, prompt: &ComposedPrompt) -> Result<String, ApplicationError> {
        let start = Instant::now();
        let response = self
            .engine
            .generate(Self::request(prompt))
            .await
            .map_err(Self::map_error)?;

        #[allow(clippy::cast_possible_truncation)]
        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(
            model = %response.model,
            tokens = ?response.usage.as_ref().map(|u| u.total_tokens),
            latency_ms,
            "Inference completed"
        );
        Ok(response.content)
    }

    #[instrument(skip(self, prompt), fields(provider = %self.engine.provider_name(), history = prompt.history.len()))]
    async fn stream(&self, prompt: &ComposedPrompt) -> Result<ReplyFragments, ApplicationError> {
        let chunks = self
            .engine
            .generate_stream(Self::request(prompt))
            .await
            .map_err(Self::map_error)?;

        let fragments = chunks
            .map_ok(|chunk| chunk.content)
            .map_err(Self::map_error)
            .try_filter(|text| future::ready(!text.is_empty()));
        Ok(fragments.boxed())
    }

    fn provider_name(&self) -> String {
        self.engine.provider_name().to_string()
    }

    fn current_model(&self) -> String {
        self.engine.default_model().to_string()
    }
}

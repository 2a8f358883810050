//! Provider selection
//!
//! Builds the engine matching an [`LlmConfig`] and dispatches to it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{LlmConfig, LlmProvider};
use crate::error::InferenceError;
use crate::ports::{InferenceEngine, InferenceRequest, InferenceResponse, StreamingResponse};
use crate::providers::{AnthropicEngine, GoogleEngine, OpenAiEngine};

/// The engine for the configured provider
pub enum ProviderEngine {
    OpenAi(OpenAiEngine),
    Azure(OpenAiEngine),
    Anthropic(AnthropicEngine),
    Google(GoogleEngine),
    /// Caller-supplied engine for the `custom` provider
    Custom(Arc<dyn InferenceEngine>),
}

impl std::fmt::Debug for ProviderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi(engine) | Self::Azure(engine) => engine.fmt(f),
            Self::Anthropic(engine) => engine.fmt(f),
            Self::Google(engine) => engine.fmt(f),
            Self::Custom(engine) => f
                .debug_struct("CustomEngine")
                .field("provider", &engine.provider_name())
                .field("model", &engine.default_model())
                .finish(),
        }
    }
}

impl ProviderEngine {
    /// Build the engine for `config.provider`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when validation fails or the provider is
    /// `custom`, which has no built-in wire format.
    pub fn from_config(config: &LlmConfig) -> Result<Self, InferenceError> {
        config.validate()?;
        let engine = match config.provider {
            LlmProvider::OpenAi => Self::OpenAi(OpenAiEngine::new(config.clone())?),
            LlmProvider::Azure => Self::Azure(OpenAiEngine::new(config.clone())?),
            LlmProvider::Anthropic => Self::Anthropic(AnthropicEngine::new(config.clone())?),
            LlmProvider::Google => Self::Google(GoogleEngine::new(config.clone())?),
            LlmProvider::Custom => {
                return Err(InferenceError::Configuration(
                    "the custom provider needs an engine supplied through ProviderEngine::custom"
                        .to_string(),
                ));
            },
        };

        info!(
            provider = %config.provider,
            model = %config.effective_model(),
            "Inference provider selected"
        );
        Ok(engine)
    }

    /// Wrap a caller-supplied engine
    #[must_use]
    pub fn custom(engine: Arc<dyn InferenceEngine>) -> Self {
        Self::Custom(engine)
    }

    fn inner(&self) -> &dyn InferenceEngine {
        match self {
            Self::OpenAi(engine) | Self::Azure(engine) => engine,
            Self::Anthropic(engine) => engine,
            Self::Google(engine) => engine,
            Self::Custom(engine) => engine.as_ref(),
        }
    }
}

#[async_trait]
impl InferenceEngine for ProviderEngine {
    async fn generate(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, InferenceError> {
        self.inner().generate(request).await
    }

    async fn generate_stream(
        &self,
        request: InferenceRequest,
    ) -> Result<StreamingResponse, InferenceError> {
        self.inner().generate_stream(request).await
    }

    fn provider_name(&self) -> &str {
        self.inner().provider_name()
    }

    fn default_model(&self) -> &str {
        self.inner().default_model()
    }
}

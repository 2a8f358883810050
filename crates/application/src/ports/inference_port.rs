//! Inference port - Interface for LLM inference

use std::pin::Pin;

use async_trait::async_trait;
use domain::ConversationTurn;
use futures::Stream;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Everything the model sees for one generation
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPrompt {
    /// System instructions
    pub system: String,
    /// Prior turns, oldest first
    pub history: Vec<ConversationTurn>,
    /// The prompt for this turn
    pub prompt: String,
}

impl ComposedPrompt {
    /// Prompt with no prior turns
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            history: Vec::new(),
            prompt: prompt.into(),
        }
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }
}

/// Lazily produced reply fragments, in generation order
///
/// Dropping the stream abandons the generation.
pub type ReplyFragments = Pin<Box<dyn Stream<Item = Result<String, ApplicationError>> + Send>>;

/// Port for inference operations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InferencePort: Send + Sync {
    /// Generate the full reply
    async fn complete(&self, prompt: &ComposedPrompt) -> Result<String, ApplicationError>;

    /// Generate the reply as a stream of text fragments
    async fn stream(&self, prompt: &ComposedPrompt) -> Result<ReplyFragments, ApplicationError>;

    /// Provider identifier, e.g. `"google"`
    fn provider_name(&self) -> String;

    /// Get the name of the current model
    fn current_model(&self) -> String;
}

//! Weather agent - The conversational entry point
//!
//! Owns the conversation memory and runs each turn through the workflow.

use std::{
    fmt,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use domain::ToolName;
use futures::{Stream, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{
    conversation_memory::ConversationMemory,
    prompt_composer::REFUSAL,
    workflow::{self, TurnContext, TurnOutcome, WorkflowState},
};
use crate::{
    classifier::{ClassifierMode, IntentClassifier},
    error::ApplicationError,
    ports::{InferencePort, ReplyFragments, WeatherPort},
};

/// Agent settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Exchanges kept in memory (default: 5)
    #[serde(default = "default_max_memory_conversations")]
    pub max_memory_conversations: usize,

    /// Classification strategy (default: `llm_fallback`)
    #[serde(default)]
    pub classifier: ClassifierMode,
}

const fn default_max_memory_conversations() -> usize {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_memory_conversations: default_max_memory_conversations(),
            classifier: ClassifierMode::default(),
        }
    }
}

impl AgentConfig {
    /// # Errors
    ///
    /// Returns a configuration error when the memory holds no exchanges.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        if self.max_memory_conversations == 0 {
            return Err(ApplicationError::Configuration(
                "max_memory_conversations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Memory usage report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryInfo {
    pub max_conversations: usize,
    pub current_conversations: usize,
    pub total_turns: usize,
    pub llm_provider: String,
    pub llm_model: String,
}

/// Conversational weather agent
pub struct WeatherAgent {
    inference: Arc<dyn InferencePort>,
    weather: Arc<dyn WeatherPort>,
    classifier: IntentClassifier,
    memory: ConversationMemory,
    config: AgentConfig,
}

impl fmt::Debug for WeatherAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherAgent")
            .field("config", &self.config)
            .field("turns", &self.memory.len())
            .finish_non_exhaustive()
    }
}

impl WeatherAgent {
    /// Create an agent over the given ports
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `config` is invalid.
    pub fn new(
        inference: Arc<dyn InferencePort>,
        weather: Arc<dyn WeatherPort>,
        config: AgentConfig,
    ) -> Result<Self, ApplicationError> {
        config.validate()?;
        info!(
            provider = %inference.provider_name(),
            model = %inference.current_model(),
            max_conversations = config.max_memory_conversations,
            classifier = ?config.classifier,
            "Weather agent ready"
        );
        Ok(Self {
            inference,
            weather,
            classifier: IntentClassifier::new(config.classifier),
            memory: ConversationMemory::for_exchanges(config.max_memory_conversations),
            config,
        })
    }

    /// Answer one utterance
    ///
    /// Out-of-domain utterances get the fixed refusal and are not remembered.
    ///
    /// # Errors
    ///
    /// Returns a domain error for a blank utterance and an inference error
    /// when the model cannot be reached. Weather tool failures are absorbed.
    #[instrument(skip(self, utterance), fields(input_len = utterance.len()))]
    pub async fn chat(&mut self, utterance: &str) -> Result<String, ApplicationError> {
        let history = self.memory.snapshot();
        let ctx = TurnContext {
            classifier: &self.classifier,
            inference: self.inference.as_ref(),
            weather: self.weather.as_ref(),
            history: &history,
        };

        match workflow::run_turn(utterance, &ctx).await? {
            TurnOutcome::Replied { utterance, reply } => {
                self.memory.record_exchange(utterance, reply.clone());
                debug!(turns = self.memory.len(), "Exchange recorded");
                Ok(reply)
            },
            TurnOutcome::Rejected => Ok(REFUSAL.to_string()),
        }
    }

    /// Answer one utterance as a stream of text fragments
    ///
    /// The exchange is recorded when the stream runs to completion. Dropping
    /// the stream early, or a stream error, records nothing.
    ///
    /// # Errors
    ///
    /// Same as [`chat`](Self::chat) for everything up to the first fragment.
    #[instrument(skip(self, utterance), fields(input_len = utterance.len()))]
    pub async fn stream_chat(
        &mut self,
        utterance: &str,
    ) -> Result<ReplyStream<'_>, ApplicationError> {
        let history = self.memory.snapshot();
        let ctx = TurnContext {
            classifier: &self.classifier,
            inference: self.inference.as_ref(),
            weather: self.weather.as_ref(),
            history: &history,
        };

        let state = workflow::run_until(WorkflowState::received(utterance), &ctx, |s| {
            matches!(s, WorkflowState::Generate { .. })
        })
        .await?;

        match state {
            WorkflowState::Generate { utterance, prompt } => {
                let fragments = self.inference.stream(&prompt).await?;
                Ok(ReplyStream::recording(fragments, &mut self.memory, utterance))
            },
            WorkflowState::Rejected => Ok(ReplyStream::refusal()),
            other => Err(ApplicationError::Internal(format!(
                "workflow stopped in unexpected state '{}'",
                other.name()
            ))),
        }
    }

    #[must_use]
    pub fn get_memory_info(&self) -> MemoryInfo {
        MemoryInfo {
            max_conversations: self.config.max_memory_conversations,
            current_conversations: self.memory.exchange_count(),
            total_turns: self.memory.len(),
            llm_provider: self.inference.provider_name(),
            llm_model: self.inference.current_model(),
        }
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
        info!("Conversation memory cleared");
    }

    /// Tools the agent can call
    #[must_use]
    pub const fn available_tools(&self) -> &'static [ToolName] {
        &ToolName::ALL
    }

    #[must_use]
    pub const fn memory(&self) -> &ConversationMemory {
        &self.memory
    }
}

/// Reply fragments of one streamed turn
///
/// Holds the agent's memory borrowed until dropped, so no other turn can run
/// meanwhile.
pub struct ReplyStream<'a> {
    inner: ReplyFragments,
    memory: Option<&'a mut ConversationMemory>,
    utterance: String,
    reply: String,
    finished: bool,
}

impl<'a> ReplyStream<'a> {
    fn recording(
        inner: ReplyFragments,
        memory: &'a mut ConversationMemory,
        utterance: String,
    ) -> Self {
        Self {
            inner,
            memory: Some(memory),
            utterance,
            reply: String::new(),
            finished: false,
        }
    }

    fn refusal() -> Self {
        Self {
            inner: Box::pin(stream::once(async { Ok(REFUSAL.to_string()) })),
            memory: None,
            utterance: String::new(),
            reply: String::new(),
            finished: false,
        }
    }

    /// Text received so far
    #[must_use]
    pub fn reply_so_far(&self) -> &str {
        &self.reply
    }
}

impl fmt::Debug for ReplyStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyStream")
            .field("records", &self.memory.is_some())
            .field("received", &self.reply.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Stream for ReplyStream<'_> {
    type Item = Result<String, ApplicationError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(fragment))) => {
                this.reply.push_str(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            },
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            },
            Poll::Ready(None) => {
                this.finished = true;
                if let Some(memory) = this.memory.take() {
                    memory.record_exchange(
                        std::mem::take(&mut this.utterance),
                        std::mem::take(&mut this.reply),
                    );
                    debug!(turns = memory.len(), "Streamed exchange recorded");
                }
                Poll::Ready(None)
            },
            Poll::Pending => Poll::Pending,
        }
    }
}

//! AI Core - Hosted LLM inference
//!
//! Provider configuration, one engine per wire format (OpenAI and Azure
//! chat completions, Anthropic messages, Gemini `generateContent`) and a
//! [`ProviderEngine`] that picks the engine for a configuration. All engines
//! support complete and server-sent-event streaming requests.

pub mod config;
pub mod engine;
pub mod error;
pub mod ports;
pub mod providers;
mod sse;

pub use config::{AzureConfig, LlmConfig, LlmProvider};
pub use engine::ProviderEngine;
pub use error::InferenceError;
pub use ports::{
    InferenceEngine, InferenceMessage, InferenceRequest, InferenceResponse, StreamingChunk,
    StreamingResponse, TokenUsage,
};
pub use providers::{AnthropicEngine, GoogleEngine, OpenAiEngine};

//! Anthropic messages API engine

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{api_key, build_client, event_stream, parse_event, read_json, send};
use crate::config::{LlmConfig, LlmProvider};
use crate::error::InferenceError;
use crate::ports::{
    InferenceEngine, InferenceRequest, InferenceResponse, StreamingChunk, StreamingResponse,
    TokenUsage,
};
use crate::sse::SseEvent;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Engine for the Anthropic messages API
pub struct AnthropicEngine {
    client: Client,
    config: LlmConfig,
    url: String,
    api_key: String,
}

impl std::fmt::Debug for AnthropicEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicEngine")
            .field("url", &self.url)
            .field("model", &self.config.effective_model())
            .finish_non_exhaustive()
    }
}

impl AnthropicEngine {
    /// Create a new Anthropic engine
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid or not
    /// for the anthropic provider.
    pub fn new(config: LlmConfig) -> Result<Self, InferenceError> {
        config.validate()?;
        if config.provider != LlmProvider::Anthropic {
            return Err(InferenceError::Configuration(format!(
                "Anthropic engine cannot serve provider '{}'",
                config.provider
            )));
        }
        let api_key = api_key(&config)?;
        let url = format!("{}/v1/messages", config.effective_base_url()?);
        let client = build_client(&config)?;

        info!(model = %config.effective_model(), "Initialized Anthropic inference engine");

        Ok(Self {
            client,
            config,
            url,
            api_key,
        })
    }

    fn build_body(&self, request: &InferenceRequest, stream: bool) -> MessagesRequest {
        MessagesRequest {
            model: self.config.effective_model().to_string(),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            system: request.system.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| Message {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature.unwrap_or(self.config.temperature),
            top_p: self.config.top_p,
            top_k: self.config.top_k,
            stream,
        }
    }

    fn post(&self, body: &MessagesRequest) -> reqwest::RequestBuilder {
        self.client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: BlockDelta },
    MessageStop,
    Error { error: ApiError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

/// Parse one `data:` payload of a messages stream
pub(crate) fn parse_stream_event(data: &str) -> Result<SseEvent, InferenceError> {
    match parse_event::<StreamEvent>(data)? {
        StreamEvent::ContentBlockDelta {
            delta: BlockDelta::TextDelta { text },
        } => Ok(SseEvent::Chunk(StreamingChunk::delta(text))),
        StreamEvent::MessageStop => Ok(SseEvent::Done),
        StreamEvent::Error { error } => {
            if error.kind == "overloaded_error" {
                Err(InferenceError::ServerError(error.message))
            } else {
                Err(InferenceError::StreamError(format!(
                    "{}: {}",
                    error.kind, error.message
                )))
            }
        },
        StreamEvent::ContentBlockDelta { .. } | StreamEvent::Other => Ok(SseEvent::Skip),
    }
}

#[async_trait]
impl InferenceEngine for AnthropicEngine {
    #[instrument(skip(self, request), fields(model = %self.config.effective_model()))]
    async fn generate(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, InferenceError> {
        let body = self.build_body(&request, false);
        debug!(messages = body.messages.len(), "Sending messages request");

        let timeout = self.config.request_timeout_secs;
        let response = send(
            self.post(&body).timeout(Duration::from_secs(timeout)),
            timeout,
        )
        .await?;
        let parsed: MessagesResponse = read_json(response, timeout).await?;

        let content: String = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();
        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens));

        debug!(tokens = ?usage, "Inference completed");

        Ok(InferenceResponse {
            content,
            model: parsed.model,
            usage,
            finish_reason: parsed.stop_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = %self.config.effective_model()))]
    async fn generate_stream(
        &self,
        request: InferenceRequest,
    ) -> Result<StreamingResponse, InferenceError> {
        let body = self.build_body(&request, true);
        debug!(messages = body.messages.len(), "Starting streaming messages request");

        let response = send(self.post(&body), self.config.request_timeout_secs).await?;
        Ok(event_stream(response, parse_stream_event))
    }

    fn provider_name(&self) -> &str {
        LlmProvider::Anthropic.as_str()
    }

    fn default_model(&self) -> &str {
        self.config.effective_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LlmConfig {
        LlmConfig::for_provider(LlmProvider::Anthropic).with_api_key("ant-key")
    }

    #[test]
    fn parses_text_delta() {
        let data = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Rain later"}}"#;
        assert_eq!(
            parse_stream_event(data).unwrap(),
            SseEvent::Chunk(StreamingChunk::delta("Rain later"))
        );
    }

    #[test]
    fn skips_bookkeeping_events() {
        for data in [
            r#"{"type":"message_start","message":{"id":"msg_1","model":"claude"}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":12}}"#,
        ] {
            assert_eq!(parse_stream_event(data).unwrap(), SseEvent::Skip, "{data}");
        }
    }

    #[test]
    fn message_stop_ends_stream() {
        assert_eq!(
            parse_stream_event(r#"{"type":"message_stop"}"#).unwrap(),
            SseEvent::Done
        );
    }

    #[test]
    fn error_event_is_error() {
        let data = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert!(matches!(
            parse_stream_event(data),
            Err(InferenceError::ServerError(_))
        ));
    }

    #[test]
    fn body_carries_system_and_top_k() {
        let engine = AnthropicEngine::new(config()).unwrap();
        let body = engine.build_body(&InferenceRequest::with_system("sys", "hi"), false);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["system"], "sys");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["top_k"], 40);
        assert_eq!(json["model"], "claude-3-5-haiku-latest");
    }

    #[test]
    fn url_uses_messages_endpoint() {
        let engine = AnthropicEngine::new(config().with_base_url("http://localhost:9000/")).unwrap();
        assert_eq!(engine.url, "http://localhost:9000/v1/messages");
    }
}

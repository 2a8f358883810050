//! OpenAI chat completions engine (also used for Azure OpenAI)

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

enum Auth {
    Bearer(String),
    AzureKey(String),
}

/// Engine speaking the OpenAI chat completions format
pub struct OpenAiEngine {
    client: Client,
    config: LlmConfig,
    url: String,
    auth: Auth,
}

impl std::fmt::Debug for OpenAiEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEngine")
            .field("provider", &self.config.provider)
            .field("url", &self.url)
            .field("model", &self.config.effective_model())
            .finish_non_exhaustive()
    }
}

impl OpenAiEngine {
    /// Create an engine for `openai` or `azure` configurations
    ///
    /// # Errors
    ///
    /// Returns a configuration error for other providers, a missing key, or a
    /// missing Azure deployment.
    pub fn new(config: LlmConfig) -> Result<Self, InferenceError> {
        config.validate()?;
        let key = api_key(&config)?;
        let base = config.effective_base_url()?;

        let (url, auth) = match config.provider {
            LlmProvider::OpenAi => (format!("{base}/v1/chat/completions"), Auth::Bearer(key)),
            LlmProvider::Azure => {
                let azure = config.azure.as_ref().ok_or_else(|| {
                    InferenceError::Configuration("missing azure settings".to_string())
                })?;
                (
                    format!(
                        "{base}/openai/deployments/{}/chat/completions?api-version={}",
                        azure.deployment, azure.api_version
                    ),
                    Auth::AzureKey(key),
                )
            },
            other => {
                return Err(InferenceError::Configuration(format!(
                    "OpenAI engine cannot serve provider '{other}'"
                )));
            },
        };

        let client = build_client(&config)?;

        info!(
            provider = %config.provider,
            model = %config.effective_model(),
            "Initialized OpenAI-compatible inference engine"
        );

        Ok(Self {
            client,
            config,
            url,
            auth,
        })
    }

    fn build_body(&self, request: &InferenceRequest, stream: bool) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));

        ChatRequest {
            model: self.config.effective_model().to_string(),
            messages,
            temperature: request.temperature.unwrap_or(self.config.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            top_p: self.config.top_p,
            stream,
        }
    }

    fn post(&self, body: &ChatRequest) -> reqwest::RequestBuilder {
        let builder = self.client.post(&self.url).json(body);
        match &self.auth {
            Auth::Bearer(key) => builder.bearer_auth(key),
            Auth::AzureKey(key) => builder.header("api-key", key),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Parse one `data:` payload of a chat completions stream
pub(crate) fn parse_stream_event(data: &str) -> Result<SseEvent, InferenceError> {
    if data.trim() == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    let event: StreamResponse = parse_event(data)?;
    // Azure sends content-filter frames with no choices
    let Some(choice) = event.choices.into_iter().next() else {
        return Ok(SseEvent::Skip);
    };
    match choice.delta.content {
        Some(text) if !text.is_empty() => Ok(SseEvent::Chunk(StreamingChunk::delta(text))),
        _ => Ok(SseEvent::Skip),
    }
}

#[async_trait]
impl InferenceEngine for OpenAiEngine {
    #[instrument(skip(self, request), fields(provider = %self.config.provider, model = %self.config.effective_model()))]
    async fn generate(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, InferenceError> {
        let body = self.build_body(&request, false);
        debug!(messages = body.messages.len(), "Sending chat completion request");

        let timeout = self.config.request_timeout_secs;
        let response = send(
            self.post(&body).timeout(Duration::from_secs(timeout)),
            timeout,
        )
        .await?;
        let parsed: ChatResponse = read_json(response, timeout).await?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            InferenceError::InvalidResponse("response contains no choices".to_string())
        })?;
        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

        debug!(tokens = ?usage, "Inference completed");

        Ok(InferenceResponse {
            content: choice.message.content.unwrap_or_default(),
            model: parsed
                .model
                .unwrap_or_else(|| self.config.effective_model().to_string()),
            usage,
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(provider = %self.config.provider, model = %self.config.effective_model()))]
    async fn generate_stream(
        &self,
        request: InferenceRequest,
    ) -> Result<StreamingResponse, InferenceError> {
        let body = self.build_body(&request, true);
        debug!(messages = body.messages.len(), "Starting streaming chat completion");

        let response = send(self.post(&body), self.config.request_timeout_secs).await?;
        Ok(event_stream(response, parse_stream_event))
    }

    fn provider_name(&self) -> &str {
        self.config.provider.as_str()
    }

    fn default_model(&self) -> &str {
        self.config.effective_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AzureConfig;

    fn openai_config() -> LlmConfig {
        LlmConfig::for_provider(LlmProvider::OpenAi)
            .with_api_key("sk-test")
            .with_model("gpt-4o-mini")
    }

    #[test]
    fn parses_content_delta() {
        let data = r#"{"id":"c1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Sunny"},"finish_reason":null}]}"#;
        assert_eq!(
            parse_stream_event(data).unwrap(),
            SseEvent::Chunk(StreamingChunk::delta("Sunny"))
        );
    }

    #[test]
    fn role_only_delta_is_skipped() {
        let data = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_stream_event(data).unwrap(), SseEvent::Skip);
    }

    #[test]
    fn empty_choices_are_skipped() {
        let data = r#"{"choices":[],"prompt_filter_results":[]}"#;
        assert_eq!(parse_stream_event(data).unwrap(), SseEvent::Skip);
    }

    #[test]
    fn done_marker() {
        assert_eq!(parse_stream_event("[DONE]").unwrap(), SseEvent::Done);
    }

    #[test]
    fn malformed_event_is_error() {
        assert!(matches!(
            parse_stream_event("{not json"),
            Err(InferenceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn body_puts_system_first() {
        let engine = OpenAiEngine::new(openai_config()).unwrap();
        let request = InferenceRequest::with_system("Be brief", "Weather?");
        let body = engine.build_body(&request, false);

        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[1].role, "user");
        assert_eq!(body.model, "gpt-4o-mini");
        assert_eq!(body.max_tokens, 1000);
        assert_eq!(body.top_p, Some(0.8));
    }

    #[test]
    fn body_never_sends_top_k() {
        let engine = OpenAiEngine::new(openai_config()).unwrap();
        let body = engine.build_body(&InferenceRequest::simple("hi"), true);
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("top_k"));
        assert!(json.contains("\"stream\":true"));
    }

    #[test]
    fn azure_url_uses_deployment() {
        let mut config = LlmConfig::for_provider(LlmProvider::Azure).with_api_key("azure-key");
        config.azure = Some(AzureConfig {
            endpoint: "https://res.openai.azure.com".to_string(),
            deployment: "weather-chat".to_string(),
            api_version: "2024-02-01".to_string(),
        });
        let engine = OpenAiEngine::new(config).unwrap();
        assert_eq!(
            engine.url,
            "https://res.openai.azure.com/openai/deployments/weather-chat/chat/completions?api-version=2024-02-01"
        );
        assert!(matches!(engine.auth, Auth::AzureKey(_)));
    }

    #[test]
    fn rejects_other_providers() {
        let config = LlmConfig::for_provider(LlmProvider::Google).with_api_key("k");
        assert!(matches!(
            OpenAiEngine::new(config),
            Err(InferenceError::Configuration(_))
        ));
    }

    #[test]
    fn debug_hides_key() {
        let engine = OpenAiEngine::new(openai_config()).unwrap();
        assert!(!format!("{engine:?}").contains("sk-test"));
    }
}

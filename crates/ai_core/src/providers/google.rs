//! Google Gemini engine

use std::time::Duration;

use async_trait::async_trait;
use domain::TurnRole;
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

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Engine for the Gemini `generateContent` API
pub struct GoogleEngine {
    client: Client,
    config: LlmConfig,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for GoogleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleEngine")
            .field("base_url", &self.base_url)
            .field("model", &self.config.effective_model())
            .finish_non_exhaustive()
    }
}

impl GoogleEngine {
    /// Create a new Gemini engine
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid or not
    /// for the google provider.
    pub fn new(config: LlmConfig) -> Result<Self, InferenceError> {
        config.validate()?;
        if config.provider != LlmProvider::Google {
            return Err(InferenceError::Configuration(format!(
                "Gemini engine cannot serve provider '{}'",
                config.provider
            )));
        }
        let api_key = api_key(&config)?;
        let base_url = config.effective_base_url()?;
        let client = build_client(&config)?;

        info!(model = %config.effective_model(), "Initialized Gemini inference engine");

        Ok(Self {
            client,
            config,
            base_url,
            api_key,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{method}",
            self.base_url,
            self.config.effective_model()
        )
    }

    fn build_body(&self, request: &InferenceRequest) -> GenerateRequest {
        GenerateRequest {
            contents: request
                .messages
                .iter()
                .map(|m| Content {
                    role: Some(
                        match m.role {
                            TurnRole::User => "user",
                            TurnRole::Assistant => "model",
                        }
                        .to_string(),
                    ),
                    parts: vec![Part {
                        text: m.content.clone(),
                    }],
                })
                .collect(),
            system_instruction: request.system.as_ref().map(|s| Content {
                role: None,
                parts: vec![Part { text: s.clone() }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature.unwrap_or(self.config.temperature),
                max_output_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
                top_p: self.config.top_p,
                top_k: self.config.top_k,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl Candidate {
    fn text(&self) -> String {
        self.content
            .as_ref()
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Parse one `data:` payload of a `streamGenerateContent?alt=sse` stream
///
/// Every event is a full response carrying the next slice of text; the one
/// with a finish reason is the last.
pub(crate) fn parse_stream_event(data: &str) -> Result<SseEvent, InferenceError> {
    let event: GenerateResponse = parse_event(data)?;
    let Some(candidate) = event.candidates.first() else {
        return Ok(SseEvent::Skip);
    };
    let text = candidate.text();
    match (&candidate.finish_reason, text.is_empty()) {
        (Some(_), _) => Ok(SseEvent::Chunk(StreamingChunk {
            content: text,
            done: true,
            model: event.model_version,
        })),
        (None, true) => Ok(SseEvent::Skip),
        (None, false) => Ok(SseEvent::Chunk(StreamingChunk::delta(text))),
    }
}

#[async_trait]
impl InferenceEngine for GoogleEngine {
    #[instrument(skip(self, request), fields(model = %self.config.effective_model()))]
    async fn generate(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, InferenceError> {
        let body = self.build_body(&request);
        debug!(contents = body.contents.len(), "Sending generateContent request");

        let timeout = self.config.request_timeout_secs;
        let builder = self
            .client
            .post(self.method_url("generateContent"))
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .timeout(Duration::from_secs(timeout));
        let response = send(builder, timeout).await?;
        let parsed: GenerateResponse = read_json(response, timeout).await?;

        let candidate = parsed.candidates.first().ok_or_else(|| {
            InferenceError::InvalidResponse("response contains no candidates".to_string())
        })?;
        let usage = parsed
            .usage_metadata
            .as_ref()
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count));

        debug!(tokens = ?usage, "Inference completed");

        Ok(InferenceResponse {
            content: candidate.text(),
            model: parsed
                .model_version
                .clone()
                .unwrap_or_else(|| self.config.effective_model().to_string()),
            usage,
            finish_reason: candidate.finish_reason.clone(),
        })
    }

    #[instrument(skip(self, request), fields(model = %self.config.effective_model()))]
    async fn generate_stream(
        &self,
        request: InferenceRequest,
    ) -> Result<StreamingResponse, InferenceError> {
        let body = self.build_body(&request);
        debug!(contents = body.contents.len(), "Starting streamGenerateContent request");

        let builder = self
            .client
            .post(self.method_url("streamGenerateContent"))
            .header(API_KEY_HEADER, self.api_key.as_str())
            .query(&[("alt", "sse")])
            .json(&body);
        let response = send(builder, self.config.request_timeout_secs).await?;
        Ok(event_stream(response, parse_stream_event))
    }

    fn provider_name(&self) -> &str {
        LlmProvider::Google.as_str()
    }

    fn default_model(&self) -> &str {
        self.config.effective_model()
    }
}

//! Hosted provider engines
//!
//! One engine per wire format. Azure OpenAI shares the OpenAI format and
//! differs only in URL and authentication.

mod anthropic;
mod google;
mod openai;

use std::time::Duration;

use futures::TryStreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::config::LlmConfig;
use crate::error::InferenceError;
use crate::ports::StreamingResponse;
use crate::sse::{SseEvent, create_stream};

pub use anthropic::AnthropicEngine;
pub use google::GoogleEngine;
pub use openai::OpenAiEngine;

/// HTTP client shared by the engines
///
/// Only connect and read timeouts are set on the client so streams can run
/// longer than a single read; `complete` calls add a per-request timeout.
pub(crate) fn build_client(config: &LlmConfig) -> Result<Client, InferenceError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .map_err(|e| InferenceError::ConnectionFailed(e.to_string()))
}

/// Send a request and reject non-success statuses
pub(crate) async fn send(
    request: RequestBuilder,
    timeout_secs: u64,
) -> Result<Response, InferenceError> {
    let response = request
        .send()
        .await
        .map_err(|e| InferenceError::from_reqwest(e, timeout_secs))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %body, "Inference request failed");
        return Err(InferenceError::from_status(status, &body));
    }
    Ok(response)
}

/// Decode a JSON body
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    timeout_secs: u64,
) -> Result<T, InferenceError> {
    response.json().await.map_err(|e| {
        if e.is_timeout() {
            InferenceError::Timeout(timeout_secs)
        } else {
            InferenceError::InvalidResponse(e.without_url().to_string())
        }
    })
}

/// Stream the response body as SSE events
pub(crate) fn event_stream<P>(response: Response, parse: P) -> StreamingResponse
where
    P: Fn(&str) -> Result<SseEvent, InferenceError> + Send + 'static,
{
    create_stream(
        Box::pin(response.bytes_stream().map_err(reqwest::Error::without_url)),
        parse,
    )
}

/// Parse one SSE payload as JSON
pub(crate) fn parse_event<T: DeserializeOwned>(data: &str) -> Result<T, InferenceError> {
    serde_json::from_str(data)
        .map_err(|e| InferenceError::InvalidResponse(format!("JSON parse error: {e}")))
}

pub(crate) fn api_key(config: &LlmConfig) -> Result<String, InferenceError> {
    config.api_key().map(str::to_string).ok_or_else(|| {
        InferenceError::Configuration(format!(
            "API key is required for provider '{}'",
            config.provider
        ))
    })
}

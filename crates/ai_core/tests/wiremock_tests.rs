//! Integration tests for the provider engines using WireMock
//!
//! Each engine is pointed at a mock server speaking its wire format.

use ai_core::{
    AzureConfig, InferenceEngine, InferenceError, InferenceRequest, LlmConfig, LlmProvider,
    ProviderEngine,
};
use domain::ConversationTurn;
use futures::StreamExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path, query_param, query_param_is_missing},
};

// =============================================================================
// Test Helpers
// =============================================================================

fn config_for(provider: LlmProvider, server: &MockServer) -> LlmConfig {
    let mut config = LlmConfig::for_provider(provider)
        .with_api_key("test-key")
        .with_base_url(server.uri());
    config.request_timeout_secs = 5;
    config
}

fn sse(events: &[&str]) -> ResponseTemplate {
    let body: String = events.iter().map(|e| format!("data: {e}\n\n")).collect();
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

async fn collect_text(engine: &ProviderEngine) -> Result<String, InferenceError> {
    let mut stream = engine
        .generate_stream(InferenceRequest::with_system("sys", "Weather in Paris?"))
        .await?;
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?.content);
    }
    Ok(text)
}

// =============================================================================
// OpenAI
// =============================================================================

#[tokio::test]
async fn openai_complete_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "stream": false,
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "Weather in Paris?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Mild and cloudy in Paris."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 6, "total_tokens": 26}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = ProviderEngine::from_config(&config_for(LlmProvider::OpenAi, &server)).unwrap();
    let response = engine
        .generate(InferenceRequest::with_system("sys", "Weather in Paris?"))
        .await
        .unwrap();

    assert_eq!(response.content, "Mild and cloudy in Paris.");
    assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
    assert_eq!(response.usage.unwrap().total_tokens, 26);
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn openai_stream_concatenates_deltas() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(sse(&[
            r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"content":"Mild "}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"content":"and cloudy."}}]}"#,
            "[DONE]",
        ]))
        .mount(&server)
        .await;

    let engine = ProviderEngine::from_config(&config_for(LlmProvider::OpenAi, &server)).unwrap();
    assert_eq!(collect_text(&engine).await.unwrap(), "Mild and cloudy.");
}

#[tokio::test]
async fn openai_history_precedes_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "messages": [
                {"role": "user", "content": "Weather in Oslo?"},
                {"role": "assistant", "content": "Cold."},
                {"role": "user", "content": "And tomorrow?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "Colder."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let history = vec![
        ConversationTurn::user("Weather in Oslo?"),
        ConversationTurn::assistant("Cold."),
    ];
    let engine = ProviderEngine::from_config(&config_for(LlmProvider::OpenAi, &server)).unwrap();
    let response = engine
        .generate(InferenceRequest::simple("And tomorrow?").with_history(&history))
        .await
        .unwrap();
    assert_eq!(response.content, "Colder.");
    assert_eq!(response.model, "gpt-4o-mini");
}

#[tokio::test]
async fn rate_limit_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let engine = ProviderEngine::from_config(&config_for(LlmProvider::OpenAi, &server)).unwrap();
    let err = engine
        .generate(InferenceRequest::simple("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::RateLimited));
}

#[tokio::test]
async fn server_error_maps_to_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let engine = ProviderEngine::from_config(&config_for(LlmProvider::OpenAi, &server)).unwrap();
    let err = collect_text(&engine).await.unwrap_err();
    match err {
        InferenceError::ServerError(msg) => assert!(msg.contains("boom")),
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_maps_to_request_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&server)
        .await;

    let engine = ProviderEngine::from_config(&config_for(LlmProvider::OpenAi, &server)).unwrap();
    let err = engine
        .generate(InferenceRequest::simple("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::RequestFailed(_)));
}

#[tokio::test]
async fn malformed_json_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let engine = ProviderEngine::from_config(&config_for(LlmProvider::OpenAi, &server)).unwrap();
    let err = engine
        .generate(InferenceRequest::simple("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::InvalidResponse(_)));
}

// =============================================================================
// Azure
// =============================================================================

#[tokio::test]
async fn azure_uses_deployment_and_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/weather-chat/chat/completions"))
        .and(query_param("api-version", "2024-02-01"))
        .and(header("api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "Sunny."}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = LlmConfig::for_provider(LlmProvider::Azure).with_api_key("test-key");
    config.azure = Some(AzureConfig {
        endpoint: server.uri(),
        deployment: "weather-chat".to_string(),
        api_version: "2024-02-01".to_string(),
    });
    let engine = ProviderEngine::from_config(&config).unwrap();
    assert_eq!(engine.provider_name(), "azure");

    let response = engine
        .generate(InferenceRequest::simple("hi"))
        .await
        .unwrap();
    assert_eq!(response.content, "Sunny.");
}

// =============================================================================
// Anthropic
// =============================================================================

#[tokio::test]
async fn anthropic_complete_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "system": "sys",
            "messages": [{"role": "user", "content": "Weather in Paris?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-haiku-20241022",
            "content": [{"type": "text", "text": "Light rain in Paris."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine =
        ProviderEngine::from_config(&config_for(LlmProvider::Anthropic, &server)).unwrap();
    let response = engine
        .generate(InferenceRequest::with_system("sys", "Weather in Paris?"))
        .await
        .unwrap();

    assert_eq!(response.content, "Light rain in Paris.");
    assert_eq!(response.model, "claude-3-5-haiku-20241022");
    assert_eq!(response.usage.unwrap().total_tokens, 17);
    assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
}

#[tokio::test]
async fn anthropic_stream_skips_bookkeeping_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(sse(&[
            r#"{"type":"message_start","message":{"id":"msg_1","model":"claude"}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Light "}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"rain."}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_stop"}"#,
        ]))
        .mount(&server)
        .await;

    let engine =
        ProviderEngine::from_config(&config_for(LlmProvider::Anthropic, &server)).unwrap();
    assert_eq!(collect_text(&engine).await.unwrap(), "Light rain.");
}

#[tokio::test]
async fn anthropic_stream_error_event_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse(&[
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Par"}}"#,
            r#"{"type":"error","error":{"type":"api_error","message":"internal"}}"#,
        ]))
        .mount(&server)
        .await;

    let engine =
        ProviderEngine::from_config(&config_for(LlmProvider::Anthropic, &server)).unwrap();
    let err = collect_text(&engine).await.unwrap_err();
    assert!(matches!(err, InferenceError::StreamError(_)));
}

// =============================================================================
// Google
// =============================================================================

#[tokio::test]
async fn google_complete_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(query_param_is_missing("key"))
        .and(body_partial_json(serde_json::json!({
            "systemInstruction": {"parts": [{"text": "sys"}]},
            "contents": [{"role": "user", "parts": [{"text": "Weather in Paris?"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Clear "}, {"text": "skies."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 3, "totalTokenCount": 12},
            "modelVersion": "gemini-2.5-flash"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = ProviderEngine::from_config(&config_for(LlmProvider::Google, &server)).unwrap();
    let response = engine
        .generate(InferenceRequest::with_system("sys", "Weather in Paris?"))
        .await
        .unwrap();

    assert_eq!(response.content, "Clear skies.");
    assert_eq!(response.usage.unwrap().total_tokens, 12);
    assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
}

#[tokio::test]
async fn google_stream_ends_on_finish_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "test-key"))
        .and(query_param_is_missing("key"))
        .respond_with(sse(&[
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Clear "}]}}]}"#,
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"skies."}]},"finishReason":"STOP"}]}"#,
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":" ignored"}]}}]}"#,
        ]))
        .mount(&server)
        .await;

    let engine = ProviderEngine::from_config(&config_for(LlmProvider::Google, &server)).unwrap();
    assert_eq!(collect_text(&engine).await.unwrap(), "Clear skies.");
}

#[tokio::test]
async fn google_without_candidates_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let engine = ProviderEngine::from_config(&config_for(LlmProvider::Google, &server)).unwrap();
    let err = engine
        .generate(InferenceRequest::simple("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::InvalidResponse(_)));
}

#[tokio::test]
async fn google_malformed_body_does_not_reveal_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let engine = ProviderEngine::from_config(&config_for(LlmProvider::Google, &server)).unwrap();
    let err = engine
        .generate(InferenceRequest::simple("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, InferenceError::InvalidResponse(_)));
    assert!(!err.to_string().contains("test-key"), "{err}");
}

#[tokio::test]
async fn google_connection_error_does_not_reveal_api_key() {
    let mut config = LlmConfig::for_provider(LlmProvider::Google)
        .with_api_key("test-key")
        .with_base_url("http://127.0.0.1:1");
    config.request_timeout_secs = 2;

    let engine = ProviderEngine::from_config(&config).unwrap();
    let err = engine
        .generate(InferenceRequest::simple("hi"))
        .await
        .unwrap_err();

    assert!(!err.to_string().contains("test-key"), "{err}");
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn unknown_provider_is_rejected() {
    let err = "mistral".parse::<LlmProvider>().unwrap_err();
    assert!(matches!(err, InferenceError::Configuration(_)));
    assert!(err.to_string().contains("mistral"));
}

#[test]
fn provider_without_key_cannot_be_built() {
    let err = ProviderEngine::from_config(&LlmConfig::for_provider(LlmProvider::Anthropic))
        .unwrap_err();
    assert!(matches!(err, InferenceError::Configuration(_)));
}

//! Integration tests for the infrastructure adapters
//!
//! Tests cover:
//! - Retry behaviour of the weather adapter against real HTTP status codes
//! - Location caching
//! - A full agent turn wired through both adapters

use std::sync::Arc;

use ai_core::{LlmConfig, LlmProvider};
use application::{AgentConfig, ClassifierMode, WeatherAgent, WeatherPort};
use domain::{GeoLocation, ToolName};
use futures::StreamExt;
use infrastructure::{LlmInferenceAdapter, OpenWeatherAdapter};
use integration_weather::WeatherConfig;
use secrecy::SecretString;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn weather_config(server: &MockServer, max_retries: u32) -> WeatherConfig {
    WeatherConfig {
        api_key: Some(SecretString::from("owm-key")),
        base_url: server.uri(),
        geo_base_url: server.uri(),
        ip_location_url: format!("{}/json", server.uri()),
        timeout_secs: 5,
        max_retries,
        ..WeatherConfig::default()
    }
}

fn adapter(server: &MockServer, max_retries: u32) -> OpenWeatherAdapter {
    OpenWeatherAdapter::new(&weather_config(server, max_retries)).unwrap()
}

fn london() -> GeoLocation {
    GeoLocation::new(51.5085, -0.1257).unwrap()
}

fn current_body() -> serde_json::Value {
    serde_json::json!({
        "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds"}],
        "main": {"temp": 14.3, "feels_like": 13.8, "temp_min": 12.9, "temp_max": 15.4, "pressure": 1009, "humidity": 78},
        "visibility": 10000,
        "wind": {"speed": 5.1, "deg": 250},
        "clouds": {"all": 75},
        "dt": 1_760_871_600,
        "sys": {"country": "GB", "sunrise": 1_760_855_400, "sunset": 1_760_893_200},
        "name": "London"
    })
}

fn geocode_body() -> serde_json::Value {
    serde_json::json!([{
        "name": "London",
        "lat": 51.5073219,
        "lon": -0.1276474,
        "country": "GB",
        "state": "England"
    }])
}

// ============================================================================
// Retry
// ============================================================================

mod retry_tests {
    use super::*;

    #[tokio::test]
    async fn server_errors_are_retried_up_to_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let result = adapter(&server, 2).current_weather(london()).await;

        assert!(!result.success);
        assert_eq!(result.tool_name, ToolName::CurrentWeather);
        assert!(result.error.as_deref().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn recovers_when_a_retry_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
            .expect(1)
            .mount(&server)
            .await;

        let result = adapter(&server, 3).current_weather(london()).await;

        assert!(result.success);
        assert_eq!(result.string("description"), Some("broken clouds"));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let result = adapter(&server, 3).forecast(london()).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("401"));
    }

    #[tokio::test]
    async fn rate_limit_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/air_pollution"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let result = adapter(&server, 3).air_pollution(london()).await;
        assert_eq!(result.error.as_deref(), Some("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn malformed_json_is_a_failed_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .expect(1)
            .mount(&server)
            .await;

        let result = adapter(&server, 3).current_weather(london()).await;
        assert!(!result.success);
        let error = result.error.as_deref().unwrap();
        assert!(error.starts_with("Parse error"));
        assert!(!error.contains("owm-key"), "{error}");
    }
}

// ============================================================================
// Caching
// ============================================================================

mod cache_tests {
    use super::*;

    #[tokio::test]
    async fn geocoding_hits_the_network_once_per_place() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(geocode_body()))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server, 0);
        let first = adapter.location_coordinates("London").await;
        let second = adapter.location_coordinates(" LONDON ").await;

        assert!(first.success);
        assert_eq!(second.number("latitude"), first.number("latitude"));
        assert_eq!(second.string("country"), Some("GB"));
    }

    #[tokio::test]
    async fn caller_location_is_looked_up_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ip": "203.0.113.7",
                "city": "Leeds",
                "region": "England",
                "country": "GB",
                "loc": "53.7965,-1.5478"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server, 0);
        assert!(adapter.current_location().await.success);
        let again = adapter.current_location().await;
        assert_eq!(again.string("name"), Some("Leeds, England"));
        assert!(adapter.location_detection_enabled());
    }
}

// ============================================================================
// Full turn
// ============================================================================

mod agent_tests {
    use super::*;

    fn sse(events: &[&str]) -> ResponseTemplate {
        let body: String = events.iter().map(|e| format!("data: {e}\n\n")).collect();
        ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
    }

    async fn mount_weather(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(geocode_body()))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("appid", "owm-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
            .mount(server)
            .await;
    }

    fn agent(server: &MockServer) -> WeatherAgent {
        let mut llm = LlmConfig::for_provider(LlmProvider::OpenAi)
            .with_api_key("sk-test")
            .with_base_url(server.uri());
        llm.request_timeout_secs = 5;

        let inference = LlmInferenceAdapter::from_config(&llm).unwrap();
        let weather = adapter(server, 1);
        let config = AgentConfig {
            max_memory_conversations: 2,
            classifier: ClassifierMode::Rules,
        };
        WeatherAgent::new(Arc::new(inference), Arc::new(weather), config).unwrap()
    }

    #[tokio::test]
    async fn chat_embeds_tool_results_in_the_prompt() {
        let server = MockServer::start().await;
        mount_weather(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("broken clouds"))
            .and(body_string_contains("Weather in London?"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "choices": [{"message": {"content": "Cloudy and 14°C in London."}, "finish_reason": "stop"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut agent = agent(&server);
        let reply = agent.chat("Weather in London?").await.unwrap();

        assert_eq!(reply, "Cloudy and 14°C in London.");
        let info = agent.get_memory_info();
        assert_eq!(info.current_conversations, 1);
        assert_eq!(info.llm_provider, "openai");
        assert_eq!(info.llm_model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn out_of_domain_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut agent = agent(&server);
        let reply = agent.chat("What's 2+2?").await.unwrap();
        assert_eq!(reply, application::REFUSAL);
        assert_eq!(agent.get_memory_info().current_conversations, 0);
    }

    #[tokio::test]
    async fn streamed_reply_is_remembered() {
        let server = MockServer::start().await;
        mount_weather(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(sse(&[
                r#"{"choices":[{"index":0,"delta":{"content":"Cloudy "}}]}"#,
                r#"{"choices":[{"index":0,"delta":{"content":"and mild."}}]}"#,
                "[DONE]",
            ]))
            .mount(&server)
            .await;

        let mut agent = agent(&server);
        let mut stream = agent.stream_chat("Weather in London?").await.unwrap();
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment.unwrap());
        }
        drop(stream);

        assert_eq!(text, "Cloudy and mild.");
        let turns = agent.memory().snapshot();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].text(), "Cloudy and mild.");
    }
}

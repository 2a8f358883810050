//! Model-backed intent classification and JSON parsing.

use std::str::FromStr;

use domain::ToolName;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{ClassifierMode, Intent, IntentClassifier, LocationQuery, ToolPlan, quick_patterns};
use crate::{
    error::ApplicationError,
    ports::{ComposedPrompt, InferencePort},
};

/// System prompt for intent classification
pub(super) const INTENT_SYSTEM_PROMPT: &str = r#"You classify messages sent to a weather assistant.
Decide whether the message is about the weather, about the assistant itself, or about something else.

Possible intents:
- "weather": current conditions, forecasts, air quality, or what the weather means for plans or clothing
- "assistant": greetings, thanks, or questions about who the assistant is and what it can do
- "out_of_domain": everything else

Possible tools for the weather intent:
- "get_weather": current conditions
- "get_forecast": the next days
- "get_air_pollution": air quality and pollutants

Reply ONLY with valid JSON:
{
  "intent": "weather" | "assistant" | "out_of_domain",
  "location": "..." (place name, or null if none is given),
  "tools": ["get_weather" | "get_forecast" | "get_air_pollution"]
}

Examples:
- "Should I take a jacket in Dublin?" → {"intent":"weather","location":"Dublin","tools":["get_weather"]}
- "Is Saturday looking good for a picnic?" → {"intent":"weather","location":null,"tools":["get_forecast"]}
- "Can I go jogging outside in Delhi?" → {"intent":"weather","location":"Delhi","tools":["get_weather","get_air_pollution"]}
- "What's your purpose?" → {"intent":"assistant","location":null,"tools":[]}
- "Write me a poem about cats" → {"intent":"out_of_domain","location":null,"tools":[]}"#;

/// Parsed intent from the model
#[derive(Debug, Deserialize)]
struct ParsedIntent {
    intent: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    tools: Vec<String>,
}

impl IntentClassifier {
    /// Classify an utterance
    ///
    /// Keyword rules run first. In [`ClassifierMode::LlmFallback`] mode the
    /// model decides the rest; replies that cannot be parsed count as out of
    /// domain.
    ///
    /// # Errors
    ///
    /// Returns the inference error when the classification call itself fails.
    #[instrument(skip(self, inference, utterance), fields(mode = ?self.mode, input_len = utterance.len()))]
    pub async fn classify(
        &self,
        inference: &dyn InferencePort,
        utterance: &str,
    ) -> Result<Intent, ApplicationError> {
        if let Some(intent) = self.classify_quick(utterance) {
            return Ok(intent);
        }
        if self.mode == ClassifierMode::Rules {
            debug!("No rule matched, treating as out of domain");
            return Ok(Intent::OutOfDomain);
        }

        debug!("No rule matched, asking the model");
        let reply = inference
            .complete(&ComposedPrompt::new(INTENT_SYSTEM_PROMPT, utterance))
            .await?;

        match parse_llm_response(&reply, utterance) {
            Ok(intent) => {
                debug!(intent = ?intent, "Model-classified utterance");
                Ok(intent)
            },
            Err(e) => {
                warn!(error = %e, response = %reply, "Failed to parse model intent response");
                Ok(Intent::OutOfDomain)
            },
        }
    }
}

/// Parse the model's JSON reply into an [`Intent`]
fn parse_llm_response(response: &str, utterance: &str) -> Result<Intent, String> {
    let parsed: ParsedIntent = serde_json::from_str(extract_json(response))
        .map_err(|e| format!("JSON parse error: {e}"))?;

    match parsed.intent.trim().to_lowercase().as_str() {
        "weather" => Ok(Intent::Weather(plan_from_parsed(&parsed, utterance))),
        "assistant" => Ok(Intent::Assistant),
        "out_of_domain" | "out-of-domain" | "other" => Ok(Intent::OutOfDomain),
        other => Err(format!("unknown intent '{other}'")),
    }
}

/// Tool plan from the model's answer, filling gaps from the keyword rules
fn plan_from_parsed(parsed: &ParsedIntent, utterance: &str) -> ToolPlan {
    let fallback = ToolPlan::from_utterance(utterance);

    let mut tools: Vec<ToolName> = Vec::new();
    for name in &parsed.tools {
        match ToolName::from_str(name.trim()) {
            Ok(tool) if !tool.is_location_tool() && !tools.contains(&tool) => tools.push(tool),
            Ok(_) => {},
            Err(e) => debug!(error = %e, "Ignoring tool suggested by the model"),
        }
    }
    if tools.is_empty() {
        tools = fallback.tools;
    }

    let location = parsed
        .location
        .as_deref()
        .map(str::trim)
        .filter(|place| !place.is_empty() && !place.eq_ignore_ascii_case("null"))
        .map(|place| LocationQuery::Named(place.to_string()))
        .or_else(|| quick_patterns::extract_place(utterance).map(LocationQuery::Named))
        .unwrap_or(LocationQuery::Detect);

    ToolPlan { location, tools }
}

/// Extract JSON from a reply that may wrap it in a code fence or prose
fn extract_json(response: &str) -> &str {
    let response = response.trim();

    for fence in ["```json", "```"] {
        if let Some((_, rest)) = response.split_once(fence)
            && let Some((body, _)) = rest.split_once("```")
        {
            return body.trim();
        }
    }

    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start <= end => &response[start..=end],
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MockInferencePort;

    fn llm_classifier() -> IntentClassifier {
        IntentClassifier::new(ClassifierMode::LlmFallback)
    }

    #[test]
    fn extract_json_plain() {
        let json = r#"{"intent":"assistant"}"#;
        assert_eq!(extract_json(json), json);
    }

    #[test]
    fn extract_json_with_code_block() {
        let response = "```json\n{\"intent\":\"weather\"}\n```";
        assert_eq!(extract_json(response), r#"{"intent":"weather"}"#);
    }

    #[test]
    fn extract_json_with_surrounding_text() {
        let response = r#"Sure! {"intent":"out_of_domain"} Hope that helps."#;
        assert_eq!(extract_json(response), r#"{"intent":"out_of_domain"}"#);
    }

    #[test]
    fn extract_json_reversed_braces() {
        assert_eq!(extract_json("} {"), "} {");
    }

    #[test]
    fn parses_weather_intent() {
        let intent = parse_llm_response(
            r#"{"intent":"weather","location":"Dublin","tools":["get_weather","get_air_pollution"]}"#,
            "Should I jog outside in Dublin?",
        )
        .unwrap();
        assert_eq!(
            intent,
            Intent::Weather(ToolPlan {
                location: LocationQuery::Named("Dublin".to_string()),
                tools: vec![ToolName::CurrentWeather, ToolName::AirPollution],
            })
        );
    }

    #[test]
    fn location_tools_and_unknown_tools_are_dropped() {
        let intent = parse_llm_response(
            r#"{"intent":"weather","location":null,"tools":["current_location","get_moon_phase"]}"#,
            "Is Saturday good for a picnic?",
        )
        .unwrap();
        let Intent::Weather(plan) = intent else {
            unreachable!("expected weather intent")
        };
        assert_eq!(plan.location, LocationQuery::Detect);
        assert_eq!(plan.tools, vec![ToolName::CurrentWeather]);
    }

    #[test]
    fn missing_location_falls_back_to_rules() {
        let intent =
            parse_llm_response(r#"{"intent":"weather"}"#, "Picnic weekend plans at Brighton")
                .unwrap();
        let Intent::Weather(plan) = intent else {
            unreachable!("expected weather intent")
        };
        assert_eq!(plan.location, LocationQuery::Named("Brighton".to_string()));
        assert_eq!(plan.tools, vec![ToolName::Forecast]);
    }

    #[test]
    fn unknown_intent_is_an_error() {
        assert!(parse_llm_response(r#"{"intent":"sports"}"#, "x").is_err());
        assert!(parse_llm_response("not json", "x").is_err());
    }

    #[tokio::test]
    async fn rules_mode_never_calls_the_model() {
        let mut inference = MockInferencePort::new();
        inference.expect_complete().never();

        let classifier = IntentClassifier::new(ClassifierMode::Rules);
        let intent = classifier
            .classify(&inference, "Tell me a joke")
            .await
            .unwrap();
        assert_eq!(intent, Intent::OutOfDomain);
    }

    #[tokio::test]
    async fn quick_match_skips_the_model() {
        let mut inference = MockInferencePort::new();
        inference.expect_complete().never();

        let intent = llm_classifier()
            .classify(&inference, "Weather in Rome?")
            .await
            .unwrap();
        assert!(matches!(intent, Intent::Weather(_)));
    }

    #[tokio::test]
    async fn model_classifies_unplaced_utterance() {
        let mut inference = MockInferencePort::new();
        inference
            .expect_complete()
            .withf(|prompt| {
                prompt.system == INTENT_SYSTEM_PROMPT && prompt.prompt == "Do I need a jacket?"
            })
            .times(1)
            .returning(|_| {
                Ok(r#"{"intent":"weather","location":null,"tools":["get_weather"]}"#.to_string())
            });

        let intent = llm_classifier()
            .classify(&inference, "Do I need a jacket?")
            .await
            .unwrap();
        assert_eq!(
            intent,
            Intent::Weather(ToolPlan {
                location: LocationQuery::Detect,
                tools: vec![ToolName::CurrentWeather],
            })
        );
    }

    #[tokio::test]
    async fn unparseable_reply_is_out_of_domain() {
        let mut inference = MockInferencePort::new();
        inference
            .expect_complete()
            .returning(|_| Ok("I think this is about sports.".to_string()));

        let intent = llm_classifier()
            .classify(&inference, "Who won yesterday?")
            .await
            .unwrap();
        assert_eq!(intent, Intent::OutOfDomain);
    }

    #[tokio::test]
    async fn inference_failure_propagates() {
        let mut inference = MockInferencePort::new();
        inference
            .expect_complete()
            .returning(|_| Err(ApplicationError::Inference("timeout".to_string())));

        let result = llm_classifier()
            .classify(&inference, "Who won yesterday?")
            .await;
        assert!(matches!(result, Err(ApplicationError::Inference(_))));
    }
}

//! Result of a single weather tool invocation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::value_objects::ToolName;

/// Outcome of one tool call
///
/// Failures are data, not errors: a failed call carries a description in
/// `error` and no payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: ToolName,
    pub success: bool,
    pub payload: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Successful call with a flat payload
    pub fn success(tool_name: ToolName, payload: Map<String, Value>) -> Self {
        Self {
            tool_name,
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Successful call built from any serializable record
    ///
    /// Records that do not serialize to a JSON object are reported as a failure.
    pub fn from_record<T: Serialize>(tool_name: ToolName, record: &T) -> Self {
        match serde_json::to_value(record) {
            Ok(Value::Object(map)) => Self::success(tool_name, map),
            Ok(other) => Self::failure(
                tool_name,
                format!("expected an object payload, got {}", json_kind(&other)),
            ),
            Err(e) => Self::failure(tool_name, format!("could not encode payload: {e}")),
        }
    }

    /// Failed call
    pub fn failure(tool_name: ToolName, error: impl Into<String>) -> Self {
        Self {
            tool_name,
            success: false,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// Read a numeric field from the payload
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.payload.as_ref()?.get(key)?.as_f64()
    }

    /// Read a string field from the payload
    #[must_use]
    pub fn string(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key)?.as_str()
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Sample {
        city: &'static str,
        temperature: f64,
    }

    #[test]
    fn success_has_payload_and_no_error() {
        let result = ToolResult::from_record(
            ToolName::CurrentWeather,
            &Sample {
                city: "Lisbon",
                temperature: 21.5,
            },
        );
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.string("city"), Some("Lisbon"));
        assert_eq!(result.number("temperature"), Some(21.5));
    }

    #[test]
    fn failure_has_error_and_no_payload() {
        let result = ToolResult::failure(ToolName::Forecast, "HTTP 503");
        assert!(!result.success);
        assert!(result.payload.is_none());
        assert_eq!(result.error.as_deref(), Some("HTTP 503"));
    }

    #[test]
    fn non_object_record_becomes_failure() {
        let result = ToolResult::from_record(ToolName::AirPollution, &vec![1, 2, 3]);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("array"));
    }

    #[test]
    fn serialization_skips_missing_error() {
        let mut map = Map::new();
        map.insert("aqi".to_string(), json!(2));
        let result = ToolResult::success(ToolName::AirPollution, map);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("get_air_pollution"));
        assert!(!json.contains("error"));
    }
}

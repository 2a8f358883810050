//! Names of the weather tools

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;

/// The closed set of tools the agent can call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolName {
    /// Current conditions for a location
    #[serde(rename = "get_weather")]
    CurrentWeather,
    /// Five-day forecast for a location
    #[serde(rename = "get_forecast")]
    Forecast,
    /// Air quality index and pollutant levels
    #[serde(rename = "get_air_pollution")]
    AirPollution,
    /// Place name to coordinates
    #[serde(rename = "get_location_coordinates")]
    Geocoding,
    /// Caller location from the public IP address
    #[serde(rename = "current_location")]
    CurrentLocation,
}

impl ToolName {
    pub const ALL: [Self; 5] = [
        Self::CurrentWeather,
        Self::Forecast,
        Self::AirPollution,
        Self::Geocoding,
        Self::CurrentLocation,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentWeather => "get_weather",
            Self::Forecast => "get_forecast",
            Self::AirPollution => "get_air_pollution",
            Self::Geocoding => "get_location_coordinates",
            Self::CurrentLocation => "current_location",
        }
    }

    /// Short description shown to the model and in `available_tools`
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::CurrentWeather => "Get current weather for a location",
            Self::Forecast => "Get 5-day weather forecast for a location",
            Self::AirPollution => "Get air quality data for coordinates",
            Self::Geocoding => "Get coordinates for a location name",
            Self::CurrentLocation => "Get the user's current location based on IP",
        }
    }

    /// Whether the tool resolves a location rather than fetching weather data
    #[must_use]
    pub const fn is_location_tool(&self) -> bool {
        matches!(self, Self::Geocoding | Self::CurrentLocation)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s.trim())
            .ok_or_else(|| DomainError::UnknownTool(s.to_string()))
    }
}

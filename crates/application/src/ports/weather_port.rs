//! Weather service port
//!
//! Defines the interface for weather data retrieval. Every call reports its
//! outcome as a [`ToolResult`]; failures never escape as errors.

use async_trait::async_trait;
use domain::{GeoLocation, ToolResult};
#[cfg(test)]
use mockall::automock;

/// Port for weather tool invocations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WeatherPort: Send + Sync {
    /// `get_weather`: current conditions at a location
    async fn current_weather(&self, location: GeoLocation) -> ToolResult;

    /// `get_forecast`: daily outlook at a location
    async fn forecast(&self, location: GeoLocation) -> ToolResult;

    /// `get_air_pollution`: air quality index and pollutants at a location
    async fn air_pollution(&self, location: GeoLocation) -> ToolResult;

    /// `get_location_coordinates`: resolve a place name
    ///
    /// A successful payload carries numeric `latitude` and `longitude` fields.
    async fn location_coordinates(&self, place: &str) -> ToolResult;

    /// `current_location`: locate the caller by IP address
    async fn current_location(&self) -> ToolResult;

    /// Whether IP-based location may be used when no place is named
    fn location_detection_enabled(&self) -> bool;
}

//! Weather adapter - Implements WeatherPort using integration_weather
//!
//! Every call is retried on transient failures and reported as a
//! [`ToolResult`]; errors never cross this boundary. Place lookups are
//! cached per adapter instance.

use std::sync::Arc;
use std::time::Duration;

use application::ports::WeatherPort;
use async_trait::async_trait;
use domain::{GeoLocation, ToolName, ToolResult};
use integration_weather::{
    IpLocationClient, LocationClient, OpenWeatherMapClient, Place, WeatherClient, WeatherConfig,
    WeatherError,
};
use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::retry::{RetryConfig, retry};

/// Geocoding results kept per adapter
const GEOCODE_CACHE_CAPACITY: u64 = 256;
const GEOCODE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// The caller's location rarely changes within a session
const IP_LOCATION_TTL: Duration = Duration::from_secs(30 * 60);

/// Adapter for OpenWeatherMap and IP geolocation
pub struct OpenWeatherAdapter {
    weather: Arc<dyn WeatherClient>,
    locator: Arc<dyn LocationClient>,
    retry: RetryConfig,
    location_detection: bool,
    places: Cache<String, Place>,
    caller_location: Cache<(), Place>,
}

impl std::fmt::Debug for OpenWeatherAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherAdapter")
            .field("max_retries", &self.retry.max_retries)
            .field("location_detection", &self.location_detection)
            .field("cached_places", &self.places.entry_count())
            .finish_non_exhaustive()
    }
}

impl OpenWeatherAdapter {
    /// Build the HTTP clients from configuration
    ///
    /// # Errors
    ///
    /// Returns `WeatherError::Configuration` when the API key is missing or a
    /// setting is out of range.
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let weather = OpenWeatherMapClient::new(config.clone())?;
        let locator = IpLocationClient::new(config)?;
        Ok(Self::with_clients(
            Arc::new(weather),
            Arc::new(locator),
            config.max_retries,
            config.enable_location_detection,
        ))
    }

    /// Assemble from existing clients
    #[must_use]
    pub fn with_clients(
        weather: Arc<dyn WeatherClient>,
        locator: Arc<dyn LocationClient>,
        max_retries: u32,
        location_detection: bool,
    ) -> Self {
        Self {
            weather,
            locator,
            retry: RetryConfig::immediate(max_retries),
            location_detection,
            places: Cache::builder()
                .max_capacity(GEOCODE_CACHE_CAPACITY)
                .time_to_live(GEOCODE_TTL)
                .build(),
            caller_location: Cache::builder()
                .max_capacity(1)
                .time_to_live(IP_LOCATION_TTL)
                .build(),
        }
    }

    fn cache_key(place: &str) -> String {
        place.trim().to_lowercase()
    }

    fn report<T: Serialize>(tool: ToolName, outcome: Result<T, WeatherError>) -> ToolResult {
        match outcome {
            Ok(record) => ToolResult::from_record(tool, &record),
            Err(e) => {
                warn!(tool = %tool, error = %e, "Weather tool failed");
                ToolResult::failure(tool, e.to_string())
            },
        }
    }

    async fn geocode(&self, place: &str) -> Result<Place, WeatherError> {
        let key = Self::cache_key(place);
        if key.is_empty() {
            return Err(WeatherError::LocationNotFound(place.to_string()));
        }
        if let Some(hit) = self.places.get(&key).await {
            debug!(place = %key, "Geocode cache hit");
            return Ok(hit);
        }

        let query = place.trim();
        let found = retry(&self.retry, || self.weather.geocode(query)).await?;
        self.places.insert(key, found.clone()).await;
        Ok(found)
    }

    async fn locate(&self) -> Result<Place, WeatherError> {
        if let Some(hit) = self.caller_location.get(&()).await {
            debug!("Caller location cache hit");
            return Ok(hit);
        }

        let found = retry(&self.retry, || self.locator.locate()).await?;
        self.caller_location.insert((), found.clone()).await;
        Ok(found)
    }
}

#[async_trait]
impl WeatherPort for OpenWeatherAdapter {
    #[instrument(skip(self), fields(location = %location))]
    async fn current_weather(&self, location: GeoLocation) -> ToolResult {
        let outcome = retry(&self.retry, || self.weather.get_current(location)).await;
        Self::report(ToolName::CurrentWeather, outcome)
    }

    #[instrument(skip(self), fields(location = %location))]
    async fn forecast(&self, location: GeoLocation) -> ToolResult {
        let outcome = retry(&self.retry, || self.weather.get_forecast(location)).await;
        Self::report(ToolName::Forecast, outcome)
    }

    #[instrument(skip(self), fields(location = %location))]
    async fn air_pollution(&self, location: GeoLocation) -> ToolResult {
        let outcome = retry(&self.retry, || self.weather.get_air_quality(location)).await;
        Self::report(ToolName::AirPollution, outcome)
    }

    #[instrument(skip(self))]
    async fn location_coordinates(&self, place: &str) -> ToolResult {
        Self::report(ToolName::Geocoding, self.geocode(place).await)
    }

    #[instrument(skip(self))]
    async fn current_location(&self) -> ToolResult {
        Self::report(ToolName::CurrentLocation, self.locate().await)
    }

    fn location_detection_enabled(&self) -> bool {
        self.location_detection
    }
}

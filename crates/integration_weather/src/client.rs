//! OpenWeatherMap client
//!
//! HTTP client for the OpenWeatherMap current weather, forecast, air
//! pollution and direct geocoding APIs.

use std::time::Duration;

use async_trait::async_trait;
use domain::{GeoLocation, Units};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::models::{
    AirQuality, AirResponse, CurrentConditions, CurrentResponse, ForecastOutlook,
    ForecastResponse, GeocodeEntry, Place,
};

/// Weather client errors
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Connection to the weather service failed or timed out
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request to the weather service failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Failed to parse response from weather service
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid coordinates provided
    #[error("Invalid coordinates: latitude must be -90 to 90, longitude must be -180 to 180")]
    InvalidCoordinates,

    /// Service is temporarily unavailable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Geocoding returned no match
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    /// Client cannot be built from the given configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl WeatherError {
    /// Whether a repeated request might succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::ServiceUnavailable(_))
    }

    /// Map a transport error
    ///
    /// The request URL carries the API key, so it is stripped first.
    pub(crate) fn from_send(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            Self::ConnectionFailed(format!("request timed out: {e}"))
        } else if e.is_connect() || e.is_request() {
            Self::ConnectionFailed(e.to_string())
        } else {
            Self::RequestFailed(e.to_string())
        }
    }
}

/// Weather service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Data API base URL (default: <https://api.openweathermap.org>)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Geocoding API base URL (default: <https://api.openweathermap.org>)
    #[serde(default = "default_base_url")]
    pub geo_base_url: String,

    /// IP geolocation endpoint (default: <https://ipinfo.io/json>)
    #[serde(default = "default_ip_location_url")]
    pub ip_location_url: String,

    /// Request timeout in seconds (default: 5)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries on transient failures (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Unit system (default: metric)
    #[serde(default)]
    pub units: Units,

    /// Fall back to IP geolocation when no place is named (default: true)
    #[serde(default = "default_true")]
    pub enable_location_detection: bool,

    /// Number of forecast days (1-5, default: 5)
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,
}

fn default_base_url() -> String {
    "https://api.openweathermap.org".to_string()
}

fn default_ip_location_url() -> String {
    "https://ipinfo.io/json".to_string()
}

const fn default_timeout() -> u64 {
    5
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_true() -> bool {
    true
}

const fn default_forecast_days() -> u8 {
    5
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            geo_base_url: default_base_url(),
            ip_location_url: default_ip_location_url(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            units: Units::default(),
            enable_location_detection: default_true(),
            forecast_days: default_forecast_days(),
        }
    }
}

impl WeatherConfig {
    /// Check ranges that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns `WeatherError::Configuration` for a zero timeout or a forecast
    /// length outside 1..=5.
    pub fn validate(&self) -> Result<(), WeatherError> {
        if self.timeout_secs == 0 {
            return Err(WeatherError::Configuration(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !(1..=5).contains(&self.forecast_days) {
            return Err(WeatherError::Configuration(format!(
                "forecast_days must be between 1 and 5, got {}",
                self.forecast_days
            )));
        }
        Ok(())
    }
}

/// Weather client trait for fetching weather data
#[async_trait]
pub trait WeatherClient: Send + Sync {
    /// Get current conditions for a location
    async fn get_current(&self, location: GeoLocation) -> Result<CurrentConditions, WeatherError>;

    /// Get the daily outlook for a location
    async fn get_forecast(&self, location: GeoLocation) -> Result<ForecastOutlook, WeatherError>;

    /// Get the air quality reading for a location
    async fn get_air_quality(&self, location: GeoLocation) -> Result<AirQuality, WeatherError>;

    /// Resolve a place name to coordinates
    async fn geocode(&self, query: &str) -> Result<Place, WeatherError>;
}

/// OpenWeatherMap HTTP client implementation
#[derive(Debug)]
pub struct OpenWeatherMapClient {
    client: Client,
    config: WeatherConfig,
    api_key: SecretString,
}

impl OpenWeatherMapClient {
    /// Create a new client with the given configuration
    ///
    /// # Errors
    ///
    /// Returns `WeatherError::Configuration` if the API key is missing or the
    /// configuration is out of range, and `ConnectionFailed` if the HTTP client
    /// cannot be initialized.
    pub fn new(config: WeatherConfig) -> Result<Self, WeatherError> {
        config.validate()?;
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or_else(|| {
                WeatherError::Configuration("OpenWeatherMap API key is required".to_string())
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WeatherError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// The configuration this client was built from
    #[must_use]
    pub const fn config(&self) -> &WeatherConfig {
        &self.config
    }

    fn data_url(&self, endpoint: &str) -> String {
        format!(
            "{}/data/2.5/{endpoint}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn coordinate_query(&self, location: GeoLocation) -> Vec<(&'static str, String)> {
        vec![
            ("lat", location.latitude().to_string()),
            ("lon", location.longitude().to_string()),
            ("appid", self.api_key.expose_secret().to_string()),
        ]
    }

    /// GET a JSON document, mapping HTTP status codes onto `WeatherError`
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, WeatherError> {
        debug!(url = %url, "Calling OpenWeatherMap");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(WeatherError::from_send)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(WeatherError::RateLimitExceeded);
        }
        if status.is_server_error() {
            return Err(WeatherError::ServiceUnavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(WeatherError::RequestFailed(format!("HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| WeatherError::ParseError(e.without_url().to_string()))
    }
}

#[async_trait]
impl WeatherClient for OpenWeatherMapClient {
    #[instrument(skip(self), fields(location = %location))]
    async fn get_current(&self, location: GeoLocation) -> Result<CurrentConditions, WeatherError> {
        let mut query = self.coordinate_query(location);
        query.push(("units", self.config.units.api_value().to_string()));

        let response: CurrentResponse = self.get_json(&self.data_url("weather"), &query).await?;
        Ok(response.into_conditions(self.config.units))
    }

    #[instrument(skip(self), fields(location = %location))]
    async fn get_forecast(&self, location: GeoLocation) -> Result<ForecastOutlook, WeatherError> {
        let mut query = self.coordinate_query(location);
        query.push(("units", self.config.units.api_value().to_string()));

        let response: ForecastResponse = self.get_json(&self.data_url("forecast"), &query).await?;
        if response.list.is_empty() {
            return Err(WeatherError::ParseError(
                "No forecast entries in response".to_string(),
            ));
        }
        Ok(response.into_outlook(self.config.units, self.config.forecast_days))
    }

    #[instrument(skip(self), fields(location = %location))]
    async fn get_air_quality(&self, location: GeoLocation) -> Result<AirQuality, WeatherError> {
        let query = self.coordinate_query(location);

        let response: AirResponse = self
            .get_json(&self.data_url("air_pollution"), &query)
            .await?;
        response.into_air_quality().ok_or_else(|| {
            WeatherError::ParseError("No air pollution data in response".to_string())
        })
    }

    #[instrument(skip(self))]
    async fn geocode(&self, query: &str) -> Result<Place, WeatherError> {
        let name = query.trim();
        if name.is_empty() {
            return Err(WeatherError::LocationNotFound(
                "empty location name".to_string(),
            ));
        }

        let url = format!(
            "{}/geo/1.0/direct",
            self.config.geo_base_url.trim_end_matches('/')
        );
        let params = [
            ("q", name.to_string()),
            ("limit", "1".to_string()),
            ("appid", self.api_key.expose_secret().to_string()),
        ];

        let entries: Vec<GeocodeEntry> = self.get_json(&url, &params).await?;
        let place: Place = entries
            .into_iter()
            .next()
            .map(Into::into)
            .ok_or_else(|| WeatherError::LocationNotFound(name.to_string()))?;

        if place.location().is_err() {
            return Err(WeatherError::InvalidCoordinates);
        }
        Ok(place)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key() -> WeatherConfig {
        WeatherConfig {
            api_key: Some(SecretString::from("test-key")),
            ..WeatherConfig::default()
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = WeatherConfig::default();
        assert_eq!(config.base_url, "https://api.openweathermap.org");
        assert_eq!(config.ip_location_url, "https://ipinfo.io/json");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.units, Units::Metric);
        assert!(config.enable_location_detection);
        assert_eq!(config.forecast_days, 5);
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let err = OpenWeatherMapClient::new(WeatherConfig::default()).unwrap_err();
        assert!(matches!(err, WeatherError::Configuration(_)));
    }

    #[test]
    fn test_blank_api_key_is_configuration_error() {
        let config = WeatherConfig {
            api_key: Some(SecretString::from("   ")),
            ..WeatherConfig::default()
        };
        assert!(matches!(
            OpenWeatherMapClient::new(config),
            Err(WeatherError::Configuration(_))
        ));
    }

    #[test]
    fn test_forecast_days_out_of_range() {
        let config = WeatherConfig {
            forecast_days: 8,
            ..config_with_key()
        };
        assert!(matches!(
            OpenWeatherMapClient::new(config),
            Err(WeatherError::Configuration(_))
        ));
    }

    #[test]
    fn test_client_creation() {
        assert!(OpenWeatherMapClient::new(config_with_key()).is_ok());
    }

    #[test]
    fn test_data_url_trims_slash() {
        let config = WeatherConfig {
            base_url: "http://localhost:9999/".to_string(),
            ..config_with_key()
        };
        let client = OpenWeatherMapClient::new(config).unwrap();
        assert_eq!(
            client.data_url("weather"),
            "http://localhost:9999/data/2.5/weather"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(WeatherError::ConnectionFailed("reset".into()).is_retryable());
        assert!(WeatherError::ServiceUnavailable("HTTP 503".into()).is_retryable());
        assert!(!WeatherError::RequestFailed("HTTP 401".into()).is_retryable());
        assert!(!WeatherError::RateLimitExceeded.is_retryable());
        assert!(!WeatherError::LocationNotFound("Atlantis".into()).is_retryable());
    }

    #[test]
    fn test_config_debug_hides_key() {
        let debug = format!("{:?}", config_with_key());
        assert!(!debug.contains("test-key"));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: WeatherConfig =
            serde_json::from_str(r#"{"api_key": "abc", "units": "imperial"}"#).unwrap();
        assert_eq!(config.units, Units::Imperial);
        assert_eq!(config.forecast_days, 5);
        assert_eq!(
            config.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("abc".to_string())
        );
    }
}

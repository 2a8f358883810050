//! IP-based geolocation client (ipinfo.io)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::client::{WeatherConfig, WeatherError};
use crate::models::{IpInfoResponse, Place};

/// Resolves the caller's approximate location
#[async_trait]
pub trait LocationClient: Send + Sync {
    /// Look up the location of the public IP address this process uses
    async fn locate(&self) -> Result<Place, WeatherError>;
}

/// ipinfo.io HTTP client
#[derive(Debug)]
pub struct IpLocationClient {
    client: Client,
    url: String,
}

impl IpLocationClient {
    /// Create a client for the configured IP location endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WeatherError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            url: config.ip_location_url.clone(),
        })
    }

    fn into_place(info: IpInfoResponse) -> Result<Place, WeatherError> {
        let loc = info
            .loc
            .ok_or_else(|| WeatherError::ParseError("response has no loc field".to_string()))?;
        let coordinates = domain::GeoLocation::parse_pair(&loc)
            .map_err(|e| WeatherError::ParseError(e.to_string()))?;

        let name = match (info.city, info.region) {
            (Some(city), Some(region)) if !region.is_empty() && region != city => {
                format!("{city}, {region}")
            },
            (Some(city), _) => city,
            (None, _) => "Current location".to_string(),
        };

        Ok(Place {
            name,
            country: info.country,
            state: None,
            latitude: coordinates.latitude(),
            longitude: coordinates.longitude(),
        })
    }
}

#[async_trait]
impl LocationClient for IpLocationClient {
    #[instrument(skip(self))]
    async fn locate(&self) -> Result<Place, WeatherError> {
        debug!(url = %self.url, "Looking up caller location");

        let response = self
            .client
            .get(&self.url)
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

        let info: IpInfoResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::ParseError(e.without_url().to_string()))?;

        Self::into_place(info)
    }
}

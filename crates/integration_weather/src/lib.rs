//! OpenWeatherMap and IP geolocation integration
//!
//! Clients for the OpenWeatherMap APIs (<https://openweathermap.org/api>) and
//! ipinfo.io. Responses are normalized into flat records ready to be handed
//! to a language model.

pub mod client;
pub mod ip_location;
mod models;

pub use client::{OpenWeatherMapClient, WeatherClient, WeatherConfig, WeatherError};
pub use ip_location::{IpLocationClient, LocationClient};
pub use models::{
    AirQuality, CurrentConditions, DailySummary, ForecastOutlook, Place, Pollutants, aqi_label,
};

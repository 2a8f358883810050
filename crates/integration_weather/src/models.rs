//! Weather data models
//!
//! Wire types for the OpenWeatherMap and ipinfo.io responses, and the flat
//! records the client normalizes them into.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use domain::{GeoLocation, Units};
use serde::{Deserialize, Serialize};

// ============================================================================
// Normalized records
// ============================================================================

/// A resolved place with coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    /// Validated coordinates of this place
    ///
    /// # Errors
    ///
    /// Returns an error if the provider handed back out-of-range coordinates.
    pub fn location(&self) -> Result<GeoLocation, domain::DomainError> {
        GeoLocation::new(self.latitude, self.longitude)
    }

    /// Human-readable label, e.g. `"Paris, FR"`
    #[must_use]
    pub fn label(&self) -> String {
        match &self.country {
            Some(country) => format!("{}, {country}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Current conditions at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub description: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    pub pressure_hpa: u32,
    pub wind_speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction_deg: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_gust: Option<f64>,
    pub cloudiness_pct: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_m: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<DateTime<Utc>>,
    pub observed_at: DateTime<Utc>,
    pub units: Units,
    pub temperature_unit: String,
    pub wind_speed_unit: String,
}

/// Summary of one forecast day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Most frequent description across the day's 3-hour steps
    pub description: String,
    /// Highest precipitation probability of the day, in percent
    pub precipitation_probability_pct: u8,
    pub rain_mm: f64,
    pub snow_mm: f64,
}

/// Multi-day outlook built from 3-hour forecast steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutlook {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub units: Units,
    pub temperature_unit: String,
    pub days: Vec<DailySummary>,
}

/// Pollutant concentrations in μg/m³
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pollutants {
    #[serde(default)]
    pub co: f64,
    #[serde(default)]
    pub no: f64,
    #[serde(default)]
    pub no2: f64,
    #[serde(default)]
    pub o3: f64,
    #[serde(default)]
    pub so2: f64,
    #[serde(default)]
    pub pm2_5: f64,
    #[serde(default)]
    pub pm10: f64,
    #[serde(default)]
    pub nh3: f64,
}

/// Air quality reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    /// Air quality index, 1 (good) to 5 (very poor)
    pub aqi: u8,
    pub label: String,
    pub components: Pollutants,
    pub measured_at: DateTime<Utc>,
}

/// Label for an OpenWeatherMap AQI value
#[must_use]
pub const fn aqi_label(aqi: u8) -> &'static str {
    match aqi {
        1 => "Good",
        2 => "Fair",
        3 => "Moderate",
        4 => "Poor",
        5 => "Very Poor",
        _ => "Unknown",
    }
}

// ============================================================================
// OpenWeatherMap wire types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ConditionEntry {
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MainBlock {
    pub temp: f64,
    #[serde(default)]
    pub feels_like: Option<f64>,
    pub temp_min: f64,
    pub temp_max: f64,
    #[serde(default)]
    pub pressure: u32,
    #[serde(default)]
    pub humidity: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct WindBlock {
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub deg: Option<u16>,
    #[serde(default)]
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CloudsBlock {
    #[serde(default)]
    pub all: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SysBlock {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub sunrise: Option<i64>,
    #[serde(default)]
    pub sunset: Option<i64>,
}

/// `/data/2.5/weather` response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CurrentResponse {
    #[serde(default)]
    pub weather: Vec<ConditionEntry>,
    pub main: MainBlock,
    #[serde(default)]
    pub visibility: Option<u32>,
    #[serde(default)]
    pub wind: WindBlock,
    #[serde(default)]
    pub clouds: CloudsBlock,
    pub dt: i64,
    #[serde(default)]
    pub sys: SysBlock,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct VolumeBlock {
    #[serde(rename = "3h", default)]
    pub three_hours: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ForecastStep {
    pub dt: i64,
    pub main: MainBlock,
    #[serde(default)]
    pub weather: Vec<ConditionEntry>,
    #[serde(default)]
    pub pop: f64,
    #[serde(default)]
    pub rain: Option<VolumeBlock>,
    #[serde(default)]
    pub snow: Option<VolumeBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ForecastCity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    /// Shift in seconds from UTC
    #[serde(default)]
    pub timezone: i64,
}

/// `/data/2.5/forecast` response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ForecastResponse {
    pub list: Vec<ForecastStep>,
    #[serde(default)]
    pub city: ForecastCity,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AqiBlock {
    pub aqi: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AirEntry {
    pub main: AqiBlock,
    #[serde(default)]
    pub components: Pollutants,
    pub dt: i64,
}

/// `/data/2.5/air_pollution` response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AirResponse {
    pub list: Vec<AirEntry>,
}

/// One entry of the `/geo/1.0/direct` response array
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GeocodeEntry {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl From<GeocodeEntry> for Place {
    fn from(entry: GeocodeEntry) -> Self {
        Self {
            name: entry.name,
            country: entry.country,
            state: entry.state,
            latitude: entry.lat,
            longitude: entry.lon,
        }
    }
}

/// ipinfo.io `/json` response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IpInfoResponse {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub loc: Option<String>,
}

// ============================================================================
// Normalization
// ============================================================================

pub(crate) fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

fn first_description(entries: &[ConditionEntry]) -> String {
    entries
        .first()
        .map_or_else(|| "unknown".to_string(), |c| c.description.clone())
}

impl CurrentResponse {
    pub(crate) fn into_conditions(self, units: Units) -> CurrentConditions {
        CurrentConditions {
            description: first_description(&self.weather),
            location: self.name,
            country: self.sys.country,
            temperature: self.main.temp,
            feels_like: self.main.feels_like.unwrap_or(self.main.temp),
            temp_min: self.main.temp_min,
            temp_max: self.main.temp_max,
            humidity: self.main.humidity,
            pressure_hpa: self.main.pressure,
            wind_speed: self.wind.speed,
            wind_direction_deg: self.wind.deg,
            wind_gust: self.wind.gust,
            cloudiness_pct: self.clouds.all,
            visibility_m: self.visibility,
            sunrise: self.sys.sunrise.and_then(timestamp),
            sunset: self.sys.sunset.and_then(timestamp),
            observed_at: timestamp(self.dt).unwrap_or_else(Utc::now),
            units,
            temperature_unit: units.temperature_symbol().to_string(),
            wind_speed_unit: units.speed_symbol().to_string(),
        }
    }
}

#[derive(Default)]
struct DayAccumulator {
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    descriptions: Vec<(String, usize)>,
    max_pop: f64,
    rain_mm: f64,
    snow_mm: f64,
}

impl DayAccumulator {
    fn add(&mut self, step: &ForecastStep) {
        self.temp_min = Some(
            self.temp_min
                .map_or(step.main.temp_min, |t| t.min(step.main.temp_min)),
        );
        self.temp_max = Some(
            self.temp_max
                .map_or(step.main.temp_max, |t| t.max(step.main.temp_max)),
        );
        let description = first_description(&step.weather);
        match self.descriptions.iter_mut().find(|(d, _)| *d == description) {
            Some((_, count)) => *count += 1,
            None => self.descriptions.push((description, 1)),
        }
        self.max_pop = self.max_pop.max(step.pop);
        self.rain_mm += step.rain.as_ref().map_or(0.0, |r| r.three_hours);
        self.snow_mm += step.snow.as_ref().map_or(0.0, |s| s.three_hours);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn finish(self, date: NaiveDate) -> DailySummary {
        // Ties go to the description seen first
        let mut dominant: Option<&(String, usize)> = None;
        for entry in &self.descriptions {
            if dominant.is_none_or(|d| entry.1 > d.1) {
                dominant = Some(entry);
            }
        }
        DailySummary {
            date,
            temp_min: self.temp_min.unwrap_or_default(),
            temp_max: self.temp_max.unwrap_or_default(),
            description: dominant.map_or_else(|| "unknown".to_string(), |(d, _)| d.clone()),
            precipitation_probability_pct: (self.max_pop.clamp(0.0, 1.0) * 100.0).round() as u8,
            rain_mm: round_tenth(self.rain_mm),
            snow_mm: round_tenth(self.snow_mm),
        }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl ForecastResponse {
    /// Group the 3-hour steps into local calendar days, keeping at most `days`
    pub(crate) fn into_outlook(self, units: Units, days: u8) -> ForecastOutlook {
        let mut grouped: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();
        for step in &self.list {
            let Some(local) = timestamp(step.dt + self.city.timezone) else {
                continue;
            };
            grouped.entry(local.date_naive()).or_default().add(step);
        }

        ForecastOutlook {
            location: self.city.name,
            country: self.city.country,
            units,
            temperature_unit: units.temperature_symbol().to_string(),
            days: grouped
                .into_iter()
                .take(usize::from(days))
                .map(|(date, acc)| acc.finish(date))
                .collect(),
        }
    }
}

impl AirResponse {
    pub(crate) fn into_air_quality(self) -> Option<AirQuality> {
        let entry = self.list.into_iter().next()?;
        Some(AirQuality {
            aqi: entry.main.aqi,
            label: aqi_label(entry.main.aqi).to_string(),
            components: entry.components,
            measured_at: timestamp(entry.dt).unwrap_or_else(Utc::now),
        })
    }
}

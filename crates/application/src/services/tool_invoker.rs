//! Tool invocation for a weather turn
//!
//! Resolves the location first, then runs the planned data tools
//! concurrently. Every outcome, including a missing location, is reported as
//! a [`ToolResult`].

use domain::{GeoLocation, ToolName, ToolResult};
use futures::future::join_all;
use tracing::{debug, instrument, warn};

use crate::{
    classifier::{LocationQuery, ToolPlan},
    error::ApplicationError,
    ports::WeatherPort,
};

/// Run a tool plan; the location result (if any) comes first
#[instrument(skip(weather, plan), fields(tools = plan.tools.len()))]
pub async fn invoke_plan(weather: &dyn WeatherPort, plan: &ToolPlan) -> Vec<ToolResult> {
    let (location_result, location) = resolve_location(weather, &plan.location).await;

    let mut results = Vec::with_capacity(plan.tools.len() + 1);
    results.extend(location_result);

    match location {
        Ok(location) => {
            let calls = plan
                .tools
                .iter()
                .map(|tool| invoke_data_tool(weather, *tool, location));
            results.extend(join_all(calls).await);
        },
        Err(e) => {
            warn!(error = %e, "No location for weather tools");
            results.extend(
                plan.tools
                    .iter()
                    .map(|tool| ToolResult::failure(*tool, e.to_string())),
            );
        },
    }

    debug!(
        succeeded = results.iter().filter(|r| r.success).count(),
        total = results.len(),
        "Tool invocation finished"
    );
    results
}

async fn resolve_location(
    weather: &dyn WeatherPort,
    query: &LocationQuery,
) -> (Option<ToolResult>, Result<GeoLocation, ApplicationError>) {
    let result = match query {
        LocationQuery::Named(place) => weather.location_coordinates(place).await,
        LocationQuery::Detect if weather.location_detection_enabled() => {
            weather.current_location().await
        },
        LocationQuery::Detect => {
            return (
                None,
                Err(ApplicationError::Tool(
                    "no location available: name a place to get weather for".to_string(),
                )),
            );
        },
    };

    let location = coordinates_of(&result);
    (Some(result), location)
}

/// Coordinates carried by a location tool result
fn coordinates_of(result: &ToolResult) -> Result<GeoLocation, ApplicationError> {
    if !result.success {
        let reason = result.error.as_deref().unwrap_or("lookup failed");
        return Err(ApplicationError::Tool(format!(
            "no location available: {reason}"
        )));
    }
    match (result.number("latitude"), result.number("longitude")) {
        (Some(latitude), Some(longitude)) => Ok(GeoLocation::new(latitude, longitude)?),
        _ => Err(ApplicationError::Tool(format!(
            "no location available: {} returned no coordinates",
            result.tool_name
        ))),
    }
}

async fn invoke_data_tool(
    weather: &dyn WeatherPort,
    tool: ToolName,
    location: GeoLocation,
) -> ToolResult {
    match tool {
        ToolName::CurrentWeather => weather.current_weather(location).await,
        ToolName::Forecast => weather.forecast(location).await,
        ToolName::AirPollution => weather.air_pollution(location).await,
        ToolName::Geocoding | ToolName::CurrentLocation => {
            ToolResult::failure(tool, "location tools are resolved before data tools")
        },
    }
}

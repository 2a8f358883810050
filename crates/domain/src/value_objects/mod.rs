//! Value objects

mod geo_location;
mod tool_name;
mod units;

pub use geo_location::GeoLocation;
pub use tool_name::ToolName;
pub use units::Units;

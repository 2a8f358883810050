//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// The user sent nothing but whitespace
    #[error("Utterance cannot be empty")]
    EmptyUtterance,

    /// Coordinates outside the valid range
    #[error(
        "Invalid coordinates ({latitude}, {longitude}): latitude must be -90 to 90, longitude must be -180 to 180"
    )]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    /// Unknown unit system name
    #[error("Invalid units: {0}. Use 'metric', 'imperial' or 'kelvin'")]
    InvalidUnits(String),

    /// Unknown tool name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

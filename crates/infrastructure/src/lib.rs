//! Infrastructure layer - Adapters for external systems
//!
//! Implements the application ports on top of the provider crates and
//! owns configuration loading, retry policy and logging setup.

pub mod adapters;
pub mod config;
pub mod retry;
pub mod telemetry;

pub use adapters::*;
pub use config::{AppConfig, LoggingConfig};
pub use retry::{RetryConfig, Retryable, retry};
pub use telemetry::{TelemetryError, init_logging};

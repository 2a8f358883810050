//! Application layer - Use cases and orchestration
//!
//! Contains the conversation memory, intent classification, the turn
//! workflow and the [`WeatherAgent`] service, plus the ports the
//! infrastructure layer implements.

pub mod classifier;
pub mod error;
pub mod ports;
pub mod services;

pub use classifier::{ClassifierMode, Intent, IntentClassifier, LocationQuery, ToolPlan};
pub use error::ApplicationError;
pub use ports::*;
pub use services::*;

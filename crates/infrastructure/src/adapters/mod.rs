//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations.

mod llm_inference_adapter;
mod weather_adapter;

pub use llm_inference_adapter::LlmInferenceAdapter;
pub use weather_adapter::OpenWeatherAdapter;

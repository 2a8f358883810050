//! Application configuration
//!
//! Layers, lowest precedence first: conventional provider variables
//! (`LLM_PROVIDER`, `OPENWEATHER_API_KEY`), an optional `config.toml`, then
//! `WEATHER_AGENT_*` variables with `__` between nested keys, e.g.
//! `WEATHER_AGENT_WEATHER__MAX_RETRIES=5`. A missing LLM key is filled from
//! the provider's usual variable (`OPENAI_API_KEY`, `GOOGLE_API_KEY`, ...).

use std::collections::HashMap;
use std::path::Path;

use ai_core::{AzureConfig, LlmConfig, LlmProvider};
use application::{AgentConfig, ApplicationError};
use integration_weather::WeatherConfig;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "WEATHER_AGENT";
const DEFAULT_AZURE_API_VERSION: &str = "2024-02-01";

/// Logging output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set (default: "warn")
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from `config.toml` (if present) and the process environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_with(None, &[])
    }

    /// Load with an explicit file in place of `config.toml`
    ///
    /// `overrides` are dotted keys (e.g. `llm.provider`) that beat every
    /// other layer.
    pub fn load_with(
        path: Option<&Path>,
        overrides: &[(&str, String)],
    ) -> Result<Self, config::ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        match path {
            Some(path) => {
                Self::from_sources(config::File::from(path).required(true), &env, overrides)
            },
            None => Self::from_sources(
                config::File::with_name("config").required(false),
                &env,
                overrides,
            ),
        }
    }

    fn from_sources<S>(
        file: S,
        env: &HashMap<String, String>,
        overrides: &[(&str, String)],
    ) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let mut builder = config::Config::builder();
        if let Some(provider) = non_empty(env, "LLM_PROVIDER") {
            builder = builder.set_default("llm.provider", provider)?;
        }
        if let Some(key) = non_empty(env, "OPENWEATHER_API_KEY") {
            builder = builder.set_default("weather.api_key", key)?;
        }

        let variables: config::Map<String, String> = env
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        builder = builder.add_source(file).add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(Some(variables)),
        );
        for (key, value) in overrides {
            builder = builder.set_override(*key, value.as_str())?;
        }

        let mut config: Self = builder.build()?.try_deserialize()?;

        config.fill_llm_from_env(env);
        Ok(config)
    }

    fn fill_llm_from_env(&mut self, env: &HashMap<String, String>) {
        let provider = self.llm.provider;
        if self.llm.api_key().is_none()
            && let Some(key) = provider
                .api_key_env_vars()
                .iter()
                .find_map(|name| non_empty(env, name))
        {
            self.llm.api_key = Some(SecretString::from(key.to_string()));
        }

        if provider == LlmProvider::Azure
            && self.llm.azure.is_none()
            && let (Some(endpoint), Some(deployment)) = (
                non_empty(env, "AZURE_OPENAI_ENDPOINT"),
                non_empty(env, "AZURE_OPENAI_DEPLOYMENT_NAME"),
            )
        {
            self.llm.azure = Some(AzureConfig {
                endpoint: endpoint.to_string(),
                deployment: deployment.to_string(),
                api_version: non_empty(env, "AZURE_OPENAI_API_VERSION")
                    .unwrap_or(DEFAULT_AZURE_API_VERSION)
                    .to_string(),
            });
        }
    }

    /// Check every section before anything is built
    ///
    /// # Errors
    ///
    /// Returns `ApplicationError::Configuration` naming the first bad setting.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        self.llm
            .validate()
            .map_err(|e| ApplicationError::Configuration(format!("llm: {e}")))?;
        self.weather
            .validate()
            .map_err(|e| ApplicationError::Configuration(format!("weather: {e}")))?;
        self.agent.validate()
    }
}

fn non_empty<'a>(env: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    env.get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

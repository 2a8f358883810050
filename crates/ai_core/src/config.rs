//! Configuration for the language model provider

use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// Hosted language model provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum LlmProvider {
    /// Google Gemini
    #[default]
    Google,
    /// OpenAI chat completions
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// Azure OpenAI deployment
    Azure,
    /// Externally supplied engine
    Custom,
}

impl LlmProvider {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Azure => "azure",
            Self::Custom => "custom",
        }
    }

    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(&self) -> &'static str {
        match self {
            Self::Google => "gemini-2.5-flash",
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::Azure => "gpt-35-turbo",
            Self::Custom => "custom",
        }
    }

    /// Public API endpoint; Azure has none and needs `AzureConfig::endpoint`
    #[must_use]
    pub const fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Google => Some("https://generativelanguage.googleapis.com"),
            Self::OpenAi => Some("https://api.openai.com"),
            Self::Anthropic => Some("https://api.anthropic.com"),
            Self::Azure | Self::Custom => None,
        }
    }

    /// Conventional environment variables holding this provider's key
    #[must_use]
    pub const fn api_key_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Google => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Anthropic => &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
            Self::Azure => &["AZURE_OPENAI_API_KEY"],
            Self::Custom => &[],
        }
    }

    #[must_use]
    pub const fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Custom)
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for LlmProvider {
    type Error = InferenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for LlmProvider {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" | "gemini" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "azure" => Ok(Self::Azure),
            "custom" => Ok(Self::Custom),
            other => Err(InferenceError::Configuration(format!(
                "unsupported LLM provider '{other}'; expected one of google, openai, anthropic, azure, custom"
            ))),
        }
    }
}

/// Azure OpenAI deployment settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
    pub endpoint: String,
    /// Deployment name
    pub deployment: String,
    /// REST API version (default: 2024-02-01)
    #[serde(default = "default_azure_api_version")]
    pub api_version: String,
}

fn default_azure_api_version() -> String {
    "2024-02-01".to_string()
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider to talk to (default: google)
    #[serde(default)]
    pub provider: LlmProvider,

    /// Model name; empty means the provider default
    #[serde(default)]
    pub model: String,

    /// API key
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Override for the provider endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    /// Sampling temperature, 0.0 - 1.0 (default: 0.1)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate (default: 1000)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Nucleus sampling (default: 0.8)
    #[serde(default = "default_top_p")]
    pub top_p: Option<f32>,

    /// Top-k sampling, only sent to providers that support it (default: 40)
    #[serde(default = "default_top_k")]
    pub top_k: Option<u32>,

    /// Request timeout in seconds (default: 60)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Required when `provider` is azure
    #[serde(default)]
    pub azure: Option<AzureConfig>,
}

const fn default_temperature() -> f32 {
    0.1
}

const fn default_max_tokens() -> u32 {
    1000
}

#[allow(clippy::unnecessary_wraps)]
const fn default_top_p() -> Option<f32> {
    Some(0.8)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_top_k() -> Option<u32> {
    Some(40)
}

const fn default_request_timeout() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: String::new(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            request_timeout_secs: default_request_timeout(),
            azure: None,
        }
    }
}

impl LlmConfig {
    /// Configuration for a provider with its default model
    #[must_use]
    pub fn for_provider(provider: LlmProvider) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Set the model name
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the engine at a different endpoint
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Model actually sent to the provider
    #[must_use]
    pub fn effective_model(&self) -> &str {
        let model = self.model.trim();
        if model.is_empty() {
            self.provider.default_model()
        } else {
            model
        }
    }

    /// Endpoint base URL without a trailing slash
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the provider has no public endpoint
    /// and none was configured.
    pub fn effective_base_url(&self) -> Result<String, InferenceError> {
        let url = match (&self.base_url, &self.azure) {
            (Some(url), _) => url.clone(),
            (None, Some(azure)) if self.provider == LlmProvider::Azure => azure.endpoint.clone(),
            (None, _) => self
                .provider
                .default_base_url()
                .map(str::to_string)
                .ok_or_else(|| {
                    InferenceError::Configuration(format!(
                        "provider '{}' needs an explicit endpoint",
                        self.provider
                    ))
                })?,
        };
        Ok(url.trim_end_matches('/').to_string())
    }

    /// API key, if set and not blank
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .filter(|key| !key.trim().is_empty())
    }

    /// Check value ranges and provider requirements
    ///
    /// # Errors
    ///
    /// Returns `InferenceError::Configuration` describing the first problem found.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(InferenceError::Configuration(format!(
                "temperature must be between 0 and 1, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(InferenceError::Configuration(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if let Some(top_p) = self.top_p
            && !(0.0..=1.0).contains(&top_p)
        {
            return Err(InferenceError::Configuration(format!(
                "top_p must be between 0 and 1, got {top_p}"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(InferenceError::Configuration(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.provider.requires_api_key() && self.api_key().is_none() {
            return Err(InferenceError::Configuration(format!(
                "API key is required for provider '{}' (set llm.api_key or {})",
                self.provider,
                self.provider.api_key_env_vars().join(" / ")
            )));
        }
        if self.provider == LlmProvider::Azure {
            let azure = self.azure.as_ref().ok_or_else(|| {
                InferenceError::Configuration(
                    "azure provider requires llm.azure.endpoint and llm.azure.deployment"
                        .to_string(),
                )
            })?;
            if azure.endpoint.trim().is_empty() || azure.deployment.trim().is_empty() {
                return Err(InferenceError::Configuration(
                    "azure endpoint and deployment must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

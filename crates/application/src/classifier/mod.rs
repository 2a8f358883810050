//! Intent classifier - Decide what a user utterance needs
//!
//! This module is split into focused sub-modules:
//! - [`quick_patterns`]: keyword rules that place most utterances without a model call
//! - [`llm`]: model-backed classification for utterances the rules cannot place

mod llm;
mod quick_patterns;

use std::fmt;

use domain::ToolName;
use serde::{Deserialize, Serialize};

/// How utterances the keyword rules cannot place are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMode {
    /// Keyword rules only; anything unplaced is out of domain
    Rules,
    /// Ask the model when the rules cannot decide
    #[default]
    LlmFallback,
}

/// Where the weather data should be fetched for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationQuery {
    /// A place named in the utterance
    Named(String),
    /// Locate the caller
    Detect,
}

/// The data tools to call for a weather question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPlan {
    pub location: LocationQuery,
    /// Data tools in call order; never contains a location tool
    pub tools: Vec<ToolName>,
}

impl ToolPlan {
    /// Plan derived from the keywords of an utterance
    #[must_use]
    pub fn from_utterance(utterance: &str) -> Self {
        let normalized = quick_patterns::normalize(utterance);
        Self {
            location: quick_patterns::extract_place(utterance)
                .map_or(LocationQuery::Detect, LocationQuery::Named),
            tools: quick_patterns::plan_tools(&normalized),
        }
    }
}

/// Classification of one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Weather question; call the planned tools
    Weather(ToolPlan),
    /// Greeting or question about the assistant; no tools
    Assistant,
    /// Anything else; refused without generation
    OutOfDomain,
}

/// Classifier for user utterances
pub struct IntentClassifier {
    mode: ClassifierMode,
}

impl fmt::Debug for IntentClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentClassifier")
            .field("mode", &self.mode)
            .finish()
    }
}

impl IntentClassifier {
    #[must_use]
    pub const fn new(mode: ClassifierMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub const fn mode(&self) -> ClassifierMode {
        self.mode
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(ClassifierMode::default())
    }
}

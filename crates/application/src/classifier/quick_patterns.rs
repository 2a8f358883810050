//! Keyword rules for utterances that don't need a model call.

use domain::ToolName;
use tracing::debug;

use super::{Intent, IntentClassifier, ToolPlan};

const WEATHER_KEYWORDS: &[&str] = &[
    "weather",
    "temperature",
    "forecast",
    "rain",
    "raining",
    "rainy",
    "drizzle",
    "snow",
    "snowing",
    "hail",
    "sunny",
    "cloudy",
    "clouds",
    "overcast",
    "wind",
    "windy",
    "humid",
    "humidity",
    "chilly",
    "freezing",
    "frost",
    "storm",
    "stormy",
    "thunder",
    "umbrella",
    "fog",
    "foggy",
    "degrees",
    "celsius",
    "fahrenheit",
    "sunrise",
    "sunset",
    "visibility",
    "air quality",
    "air pollution",
    "pollution",
    "aqi",
    "smog",
];

/// Also common outside weather talk ("I have a cold"); they count only
/// together with a [`SKY_CUES`] phrase
const AMBIGUOUS_KEYWORDS: &[&str] = &["hot", "cold", "warm", "cool"];

const SKY_CUES: &[&str] = &[
    "is it",
    "will it",
    "it is",
    "it s",
    "outside",
    "today",
    "tonight",
    "tomorrow",
    "this week",
    "this weekend",
];

const FORECAST_KEYWORDS: &[&str] = &[
    "forecast",
    "tomorrow",
    "week",
    "weekend",
    "next days",
    "next few days",
    "coming days",
    "upcoming",
];

const AIR_KEYWORDS: &[&str] = &[
    "air quality",
    "air pollution",
    "pollution",
    "aqi",
    "smog",
    "particulate",
];

const CURRENT_KEYWORDS: &[&str] = &["now", "current", "currently", "today", "temperature"];

const ASSISTANT_PHRASES: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "thanks",
    "thank you",
    "bye",
    "goodbye",
    "who are you",
    "what are you",
    "who made you",
    "who created you",
    "who built you",
    "who developed you",
    "your name",
    "what can you do",
    "help",
];

const PLACE_PREPOSITIONS: &[&str] = &["in", "for", "at", "near"];

const NOT_A_PLACE: &[&str] = &[
    "the", "a", "an", "my", "me", "this", "that", "it", "us", "you", "here", "there", "and",
    "now", "today", "tonight", "tomorrow", "moment", "week", "weekend", "next", "right", "day",
    "days", "hours", "morning", "afternoon", "evening", "night", "like", "please", "outside",
    "least", "all", "celsius", "fahrenheit", "kelvin", "degrees", "metric", "imperial",
];

const MAX_PLACE_WORDS: usize = 4;

/// Lower-case the utterance, replace punctuation with spaces and pad it so
/// keywords can be matched as whole words with `" {kw} "`
pub(super) fn normalize(utterance: &str) -> String {
    let cleaned: String = utterance
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    format!(" {} ", words.join(" "))
}

fn contains_any(normalized: &str, keywords: &[&str]) -> bool {
    keywords
        .iter()
        .any(|kw| normalized.contains(&format!(" {kw} ")))
}

/// Data tools for a normalized utterance
///
/// Forecast and air-quality keywords add their tools; the current weather is
/// fetched when asked for explicitly or when nothing else matched.
pub(super) fn plan_tools(normalized: &str) -> Vec<ToolName> {
    let forecast = contains_any(normalized, FORECAST_KEYWORDS);
    let air = contains_any(normalized, AIR_KEYWORDS);
    let current = contains_any(normalized, CURRENT_KEYWORDS);

    let mut tools = Vec::with_capacity(3);
    if current || (!forecast && !air) {
        tools.push(ToolName::CurrentWeather);
    }
    if forecast {
        tools.push(ToolName::Forecast);
    }
    if air {
        tools.push(ToolName::AirPollution);
    }
    tools
}

/// Place named after `in`, `for`, `at` or `near`
pub(super) fn extract_place(utterance: &str) -> Option<String> {
    let tokens: Vec<&str> = utterance.split_whitespace().collect();

    for (i, token) in tokens.iter().enumerate() {
        let preposition = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if !PLACE_PREPOSITIONS.contains(&preposition.as_str()) {
            continue;
        }

        let mut words: Vec<&str> = Vec::new();
        for raw in &tokens[i + 1..] {
            let word = raw
                .trim_start_matches(['"', '\''])
                .trim_end_matches(['?', '!', '.', ';', ':', '"', '\'']);
            let bare = word.trim_end_matches(',');
            if bare.is_empty() || NOT_A_PLACE.contains(&bare.to_lowercase().as_str()) {
                break;
            }
            words.push(word);
            let ends_sentence = raw.ends_with(['?', '!', '.', ';', ':']);
            if ends_sentence || words.len() == MAX_PLACE_WORDS {
                break;
            }
        }

        if !words.is_empty() {
            let place = words.join(" ");
            return Some(place.trim_end_matches(',').to_string());
        }
    }
    None
}

/// `2+2`, `12 * 7` and the like
///
/// `-` is left out so ranges such as "10-15 degrees" stay weather questions.
fn looks_like_arithmetic(utterance: &str) -> bool {
    let chars: Vec<char> = utterance.chars().filter(|c| !c.is_whitespace()).collect();
    chars.windows(3).any(|w| {
        w[0].is_ascii_digit()
            && matches!(w[1], '+' | '*' | '/' | '^' | '×' | '÷' | '=')
            && w[2].is_ascii_digit()
    })
}

fn mentions_weather(normalized: &str) -> bool {
    contains_any(normalized, WEATHER_KEYWORDS)
        || (contains_any(normalized, AMBIGUOUS_KEYWORDS) && contains_any(normalized, SKY_CUES))
}

impl IntentClassifier {
    /// Classify with keyword rules alone
    ///
    /// Returns `None` when the rules cannot place the utterance.
    pub fn classify_quick(&self, utterance: &str) -> Option<Intent> {
        let normalized = normalize(utterance);

        let intent = if looks_like_arithmetic(utterance) {
            Intent::OutOfDomain
        } else if mentions_weather(&normalized) {
            Intent::Weather(ToolPlan::from_utterance(utterance))
        } else if contains_any(&normalized, ASSISTANT_PHRASES) {
            Intent::Assistant
        } else {
            return None;
        };

        debug!(intent = ?intent, "Quick-classified utterance");
        Some(intent)
    }
}

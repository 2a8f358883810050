//! Prompt composition
//!
//! Turns the user's utterance and the tool results of one turn into the
//! prompt the model answers.

use std::fmt::Write as _;

use chrono::{DateTime, Local};
use domain::{ConversationTurn, ToolResult};

use crate::ports::ComposedPrompt;

/// Reply for anything outside the weather domain
pub const REFUSAL: &str = "I can only assist with weather-related queries.";

const NO_DATA_MARKER: &str = "No weather data available: every tool call failed. Tell the user the weather data could not be fetched right now and suggest trying again later. Do not invent values.";

/// Conversational system prompt, stamped with the current date and time
#[must_use]
pub fn system_prompt(now: DateTime<Local>) -> String {
    format!(
        "You are a friendly weather assistant developed by CodexJitin. You talk like a \
         knowledgeable friend who enjoys chatting about the weather.\n\
         Current date and time: {}\n\
         \n\
         Guidelines:\n\
         Answer in natural, flowing sentences. Never use bullet points, numbered lists or \
         other structured formatting.\n\
         Base every weather detail on the tool results you are given and never invent values.\n\
         If a tool result is marked unavailable, say that part of the data could not be \
         fetched instead of quoting the error.\n\
         Stay focused on the weather and on questions about yourself as the assistant. If \
         someone asks who created you, mention that you were developed by CodexJitin.\n\
         If the user brings up anything outside of weather, reply with: \"{REFUSAL}\"",
        now.format("%A, %d %B %Y %I:%M %p")
    )
}

/// Prompt text for one turn
///
/// Successful tool payloads are embedded as JSON, failures as
/// `unavailable: <error>` lines. When tools ran and none succeeded an
/// explicit marker tells the model there is no data.
#[must_use]
pub fn prompt_text(utterance: &str, results: &[ToolResult]) -> String {
    if results.is_empty() {
        return utterance.to_string();
    }

    let mut text = format!("User question: {utterance}\n\nTool results:\n");
    for result in results {
        match (&result.payload, result.success) {
            (Some(payload), true) => {
                let json = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
                let _ = writeln!(text, "{}: {json}", result.tool_name);
            },
            _ => {
                let error = result.error.as_deref().unwrap_or("unknown error");
                let _ = writeln!(text, "{}: unavailable: {error}", result.tool_name);
            },
        }
    }

    let data_succeeded = results
        .iter()
        .any(|r| r.success && !r.tool_name.is_location_tool());
    if !data_succeeded {
        text.push('\n');
        text.push_str(NO_DATA_MARKER);
        text.push('\n');
    }
    text
}

/// Full prompt for one turn
#[must_use]
pub fn compose(
    utterance: &str,
    results: &[ToolResult],
    history: Vec<ConversationTurn>,
    now: DateTime<Local>,
) -> ComposedPrompt {
    ComposedPrompt::new(system_prompt(now), prompt_text(utterance, results)).with_history(history)
}

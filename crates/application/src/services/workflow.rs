//! Turn workflow state machine
//!
//! One chat turn moves through
//! `Received → Classify → ToolInvocation → Compose → Generate → Done`, or
//! from `Classify` straight to `Rejected` for out-of-domain utterances.
//! [`step`] performs one transition; [`run_until`] drives it.

use chrono::Local;
use domain::{ConversationTurn, DomainError, ToolResult};
use tracing::{debug, trace};

use super::{prompt_composer, tool_invoker};
use crate::{
    classifier::{Intent, IntentClassifier, ToolPlan},
    error::ApplicationError,
    ports::{ComposedPrompt, InferencePort, WeatherPort},
};

/// Position of a turn in the workflow
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Received {
        utterance: String,
    },
    Classify {
        utterance: String,
    },
    /// `plan` is `None` for assistant questions, which need no tools
    ToolInvocation {
        utterance: String,
        plan: Option<ToolPlan>,
    },
    Compose {
        utterance: String,
        results: Vec<ToolResult>,
    },
    Generate {
        utterance: String,
        prompt: ComposedPrompt,
    },
    Done {
        utterance: String,
        reply: String,
    },
    Rejected,
}

impl WorkflowState {
    /// Start a turn
    pub fn received(utterance: impl Into<String>) -> Self {
        Self::Received {
            utterance: utterance.into(),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Received { .. } => "received",
            Self::Classify { .. } => "classify",
            Self::ToolInvocation { .. } => "tool_invocation",
            Self::Compose { .. } => "compose",
            Self::Generate { .. } => "generate",
            Self::Done { .. } => "done",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Rejected)
    }
}

/// How a finished turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered; the exchange is recorded
    Replied { utterance: String, reply: String },
    /// Out of domain; answered with the refusal and not recorded
    Rejected,
}

impl TurnOutcome {
    /// Text returned to the caller
    #[must_use]
    pub fn reply(&self) -> &str {
        match self {
            Self::Replied { reply, .. } => reply,
            Self::Rejected => prompt_composer::REFUSAL,
        }
    }
}

/// Collaborators a turn needs
pub struct TurnContext<'a> {
    pub classifier: &'a IntentClassifier,
    pub inference: &'a dyn InferencePort,
    pub weather: &'a dyn WeatherPort,
    /// History as it was when the turn started
    pub history: &'a [ConversationTurn],
}

/// Perform one transition
///
/// # Errors
///
/// Returns a domain error for a blank utterance and the inference error when
/// classification or generation fails. Tool failures never surface here.
pub async fn step(
    state: WorkflowState,
    ctx: &TurnContext<'_>,
) -> Result<WorkflowState, ApplicationError> {
    let next = match state {
        WorkflowState::Received { utterance } => {
            let utterance = utterance.trim();
            if utterance.is_empty() {
                return Err(DomainError::EmptyUtterance.into());
            }
            WorkflowState::Classify {
                utterance: utterance.to_string(),
            }
        },
        WorkflowState::Classify { utterance } => {
            match ctx.classifier.classify(ctx.inference, &utterance).await? {
                Intent::Weather(plan) => WorkflowState::ToolInvocation {
                    utterance,
                    plan: Some(plan),
                },
                Intent::Assistant => WorkflowState::ToolInvocation {
                    utterance,
                    plan: None,
                },
                Intent::OutOfDomain => WorkflowState::Rejected,
            }
        },
        WorkflowState::ToolInvocation { utterance, plan } => {
            let results = match plan {
                Some(plan) => tool_invoker::invoke_plan(ctx.weather, &plan).await,
                None => Vec::new(),
            };
            WorkflowState::Compose { utterance, results }
        },
        WorkflowState::Compose { utterance, results } => {
            let prompt =
                prompt_composer::compose(&utterance, &results, ctx.history.to_vec(), Local::now());
            WorkflowState::Generate { utterance, prompt }
        },
        WorkflowState::Generate { utterance, prompt } => {
            let reply = ctx.inference.complete(&prompt).await?;
            WorkflowState::Done { utterance, reply }
        },
        terminal @ (WorkflowState::Done { .. } | WorkflowState::Rejected) => terminal,
    };

    trace!(state = next.name(), "Workflow transition");
    Ok(next)
}

/// Drive the workflow until `stop` holds or a terminal state is reached
///
/// # Errors
///
/// Propagates the first error from [`step`].
pub async fn run_until(
    mut state: WorkflowState,
    ctx: &TurnContext<'_>,
    stop: impl Fn(&WorkflowState) -> bool,
) -> Result<WorkflowState, ApplicationError> {
    while !state.is_terminal() && !stop(&state) {
        state = step(state, ctx).await?;
    }
    debug!(state = state.name(), "Workflow stopped");
    Ok(state)
}

/// Run a whole turn with a complete (non-streaming) generation
///
/// # Errors
///
/// Propagates the first error from [`step`].
pub async fn run_turn(
    utterance: &str,
    ctx: &TurnContext<'_>,
) -> Result<TurnOutcome, ApplicationError> {
    match run_until(WorkflowState::received(utterance), ctx, |_| false).await? {
        WorkflowState::Done { utterance, reply } => Ok(TurnOutcome::Replied { utterance, reply }),
        WorkflowState::Rejected => Ok(TurnOutcome::Rejected),
        other => Err(ApplicationError::Internal(format!(
            "workflow stopped in non-terminal state '{}'",
            other.name()
        ))),
    }
}

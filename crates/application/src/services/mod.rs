//! Application services - Use case implementations

mod conversation_memory;
pub mod prompt_composer;
pub mod tool_invoker;
pub mod workflow;
mod weather_agent;

pub use conversation_memory::ConversationMemory;
pub use prompt_composer::REFUSAL;
pub use weather_agent::{AgentConfig, MemoryInfo, ReplyStream, WeatherAgent};
pub use workflow::{TurnOutcome, WorkflowState};

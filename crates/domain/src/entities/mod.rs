//! Domain entities

mod conversation_turn;
mod tool_result;

pub use conversation_turn::{ConversationTurn, TurnRole};
pub use tool_result::ToolResult;

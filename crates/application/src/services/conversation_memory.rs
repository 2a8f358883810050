//! Bounded in-memory conversation history
//!
//! Holds the most recent turns of one agent. When full, appending drops the
//! oldest turn first.

use std::collections::VecDeque;

use domain::{ConversationTurn, TurnRole};
use tracing::trace;

/// Ordered, bounded sequence of conversation turns
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationMemory {
    /// Memory holding at most `capacity` turns
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Memory sized for `exchanges` user/assistant pairs
    #[must_use]
    pub fn for_exchanges(exchanges: usize) -> Self {
        Self::new(exchanges.saturating_mul(2))
    }

    /// Append a turn, evicting the oldest when full
    pub fn append(&mut self, turn: ConversationTurn) {
        if self.capacity == 0 {
            return;
        }
        while self.turns.len() >= self.capacity {
            if let Some(evicted) = self.turns.pop_front() {
                trace!(role = %evicted.role(), "Evicted oldest turn");
            }
        }
        self.turns.push_back(turn);
    }

    /// Append a completed user/assistant exchange
    pub fn record_exchange(&mut self, utterance: impl Into<String>, reply: impl Into<String>) {
        self.append(ConversationTurn::user(utterance));
        self.append(ConversationTurn::assistant(reply));
    }

    /// Owned copy of the stored turns, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored user turns
    #[must_use]
    pub fn exchange_count(&self) -> usize {
        self.turns
            .iter()
            .filter(|turn| turn.role() == TurnRole::User)
            .count()
    }
}

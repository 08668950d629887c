//! Conversation turn history.
//!
//! Stores the recent user/assistant exchanges of one chat session in a
//! fixed-capacity ring buffer. The session's system prompt is injected at
//! request time and never stored here, so capacity governs genuine
//! conversational turns only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of turns retained per session.
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// The author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) output.
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message exchanged in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who sent this turn.
    pub role: Role,
    /// The turn text.
    pub content: String,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a turn with the given role, stamped now.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Turn history with fixed capacity.
///
/// Pushing at capacity evicts the oldest turn first.
#[derive(Debug, Clone)]
pub struct TurnHistory {
    /// Turns in insertion order (oldest first).
    turns: VecDeque<Turn>,
    /// Maximum number of turns to retain.
    capacity: usize,
}

impl TurnHistory {
    /// Create a new history with the given capacity (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new turn, evicting the oldest if at capacity.
    pub fn push(&mut self, turn: Turn) {
        if self.turns.len() >= self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Iterate turns in chronological order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// The oldest retained turn, if any.
    #[must_use]
    pub fn oldest(&self) -> Option<&Turn> {
        self.turns.front()
    }

    /// Number of turns currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the history holds no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The maximum number of turns retained.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TurnHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap_or_default();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn push_and_iterate_in_order() {
        let mut history = TurnHistory::new(10);
        history.push(Turn::user("hello"));
        history.push(Turn::assistant("hi there"));

        let contents: Vec<&str> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "hi there"]);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut history = TurnHistory::new(3);
        history.push(Turn::user("one"));
        history.push(Turn::assistant("two"));
        history.push(Turn::user("three"));
        history.push(Turn::assistant("four"));

        assert_eq!(history.len(), 3);
        let contents: Vec<&str> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three", "four"]);
        assert_eq!(history.oldest().map(|t| t.content.as_str()), Some("two"));
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut history = TurnHistory::new(4);
        for i in 0..50 {
            history.push(Turn::user(format!("turn {i}")));
            assert!(history.len() <= 4);
        }
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut history = TurnHistory::new(0);
        history.push(Turn::user("kept"));
        assert_eq!(history.len(), 1);
        assert_eq!(history.capacity(), 1);
    }

    #[test]
    fn default_capacity() {
        assert_eq!(TurnHistory::default().capacity(), DEFAULT_HISTORY_CAPACITY);
    }
}

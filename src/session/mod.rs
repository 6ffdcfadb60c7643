//! Session management
//!
//! A session is a caller-identified conversation thread: the retained
//! history tail, a rolling summary of compacted older turns, and the
//! per-session checkpoint identity managed by the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod compactor;
mod registry;

pub use compactor::compact_history;
pub use registry::SessionRegistry;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One conversation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A conversation session
///
/// Created empty on first sight of an id, appended to on every completed
/// turn, compacted opportunistically, never deleted automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Caller-supplied session identifier
    pub id: String,

    /// Retained conversation turns, oldest first
    pub history: Vec<Turn>,

    /// Rolling summary of turns compacted out of `history`
    pub summary: String,

    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh, empty session
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history: Vec::new(),
            summary: String::new(),
            updated_at: Utc::now(),
        }
    }

    /// Append a completed user/assistant exchange
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.push(Turn::user(user));
        self.history.push(Turn::assistant(assistant));
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_is_empty() {
        let session = Session::new("sess-1");
        assert_eq!(session.id, "sess-1");
        assert!(session.history.is_empty());
        assert!(session.summary.is_empty());
    }

    #[test]
    fn test_record_exchange_appends_both_turns() {
        let mut session = Session::new("sess-1");
        session.record_exchange("question", "answer");

        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].role, Role::User);
        assert_eq!(session.history[1].role, Role::Assistant);
        assert_eq!(session.history[1].content, "answer");
    }

    #[test]
    fn test_turn_serde_roundtrip() {
        let turn = Turn::user("hello");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"user\""));

        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::User);
        assert_eq!(back.content, "hello");
    }
}

//! Conversation turns and the transcript log

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Role in a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// The person practicing or asking for coaching
    User,
    /// The conversational agent
    Assistant,
}

impl TurnRole {
    /// Map a wire-level role string to a role, if recognized.
    ///
    /// The transport labels agent speech as either "agent" or "assistant"
    /// depending on the event kind.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(TurnRole::User),
            "agent" | "assistant" => Some(TurnRole::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single conversation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke
    pub role: TurnRole,
    /// What was said
    pub content: String,
    /// When the turn was recorded
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only transcript of a session.
///
/// Shared between the session (which appends as transcript events arrive),
/// the tool bridge (which snapshots it for backend calls) and the
/// controller (which snapshots it for fallback persistence). Turns are
/// never mutated or removed.
#[derive(Debug, Default)]
pub struct TranscriptLog {
    turns: RwLock<Vec<Turn>>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn
    pub fn push(&self, role: TurnRole, content: impl Into<String>) {
        self.turns.write().push(Turn::new(role, content));
    }

    /// Snapshot the current turns in order
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.read().clone()
    }

    /// Number of turns recorded so far
    pub fn len(&self) -> usize {
        self.turns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.read().is_empty()
    }
}

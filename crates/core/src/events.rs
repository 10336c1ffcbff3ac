//! Session event union
//!
//! Everything the session layer reports to the UI layer flows through one
//! channel of `SessionEvent`, so the consumer can match exhaustively
//! instead of wiring a callback per event kind.

use crate::analysis::ConversationAnalysis;
use crate::conversation::TurnRole;

/// Events emitted by a live voice session, in transport order
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A completed transcript turn (already appended to the session log)
    Transcript { role: TurnRole, content: String },
    /// Raw PCM16 audio from the agent, ready for the playback scheduler
    AgentAudio(Vec<u8>),
    /// The agent's analyze tool call produced an analysis
    AnalysisReady(ConversationAnalysis),
    /// The practice session was durably saved
    Persisted { practice_session_id: String },
    /// A transport error surfaced to the UI (only during the close-out
    /// sequence; earlier post-configuration errors are telemetry)
    Error { code: String, description: String },
    /// The transport closed; no further events will arrive
    Closed,
}

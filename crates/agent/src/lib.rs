//! Voice-agent session layer
//!
//! Owns the duplex connection to the hosted conversational agent and
//! everything that hangs off it:
//! - [`transport`]: the duplex transport seam and wire types, with a
//!   WebSocket adapter in [`ws`]
//! - [`session`]: the session orchestrator (configuration, event
//!   dispatch, teardown)
//! - [`tools`]: mid-conversation tool-call bridging to the backend
//! - [`backend`]: the analysis backend client
//! - [`controller`]: the UI-facing conversation state machine
//! - [`prompts`]: mode-specific system prompt construction

pub mod backend;
pub mod controller;
pub mod prompts;
pub mod session;
pub mod tools;
pub mod transport;
pub mod ws;

pub use backend::{AnalysisBackend, BackendError, HttpAnalysisBackend};
pub use controller::{ControllerState, ConversationController};
pub use prompts::PromptContext;
pub use session::{SessionMode, SessionState, VoiceAgentSession};
pub use tools::{ToolCallBridge, TOOL_ANALYZE, TOOL_PERSIST};
pub use transport::{
    AgentTransport, SessionSettings, ToolCallRequest, ToolCallResponse, TransportError,
    TransportEvent,
};
pub use ws::WsTransport;

use thiserror::Error;

/// Session-layer errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("system prompt is {len} chars, exceeding the {budget} char budget")]
    PromptTooLarge { len: usize, budget: usize },

    #[error("transport did not become ready within {0}s")]
    OpenTimeout(u64),

    #[error("session configuration failed: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("a session is already active")]
    SessionActive,

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

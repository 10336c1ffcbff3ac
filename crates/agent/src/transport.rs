//! Duplex transport seam
//!
//! The session talks to the remote agent through [`AgentTransport`], a
//! persistent duplex channel carrying outbound microphone audio and a
//! one-time configuration message one way, and text / audio / tool-call /
//! error events the other way.
//!
//! Wire-format concerns stay on the adapter side of this seam: adapters
//! normalize audio payloads (binary frame or base64 text) into plain byte
//! buffers and validate tool-call events against the strict schema before
//! anything reaches the session, so the session only ever sees
//! [`TransportEvent`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use podium_core::{AudioEncoding, SampleRate};

/// Transport errors
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("transport is closed")]
    Closed,
}

/// One-time configuration message, sent before any audio
#[derive(Debug, Clone, Serialize)]
pub struct SessionSettings {
    pub audio: AudioConfig,
    pub agent: AgentConfig,
}

/// Audio codec and rate for both directions
#[derive(Debug, Clone, Serialize)]
pub struct AudioConfig {
    pub input: AudioFormat,
    pub output: AudioFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioFormat {
    pub encoding: String,
    pub sample_rate: u32,
}

impl AudioFormat {
    pub fn new(encoding: AudioEncoding, rate: SampleRate) -> Self {
        Self {
            encoding: encoding.wire_name().to_string(),
            sample_rate: rate.as_u32(),
        }
    }
}

/// Model selectors, instructions and greeting
#[derive(Debug, Clone, Serialize)]
pub struct AgentConfig {
    pub listen: ListenConfig,
    pub think: ThinkConfig,
    pub speak: SpeakConfig,
    pub greeting: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListenConfig {
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThinkConfig {
    pub model: String,
    pub instructions: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakConfig {
    pub voice: String,
}

/// A tool call raised by the remote agent.
///
/// `id` and `name` are required; events missing either fail schema
/// validation at the adapter and surface as protocol errors instead.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// The correlated response for one tool call
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResponse {
    pub id: String,
    pub name: String,
    pub content: serde_json::Value,
}

/// Normalized inbound events, in the order the transport emitted them
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection is established
    Opened,
    /// The configuration message was accepted; audio may flow
    Ready,
    /// A conversation text event; role is the raw wire label
    Text {
        role: Option<String>,
        content: String,
    },
    /// Agent audio, already normalized to PCM16 bytes (never empty)
    Audio(Vec<u8>),
    /// A schema-valid tool call
    ToolCall(ToolCallRequest),
    /// An error event (includes adapter-detected protocol errors)
    Error { code: String, description: String },
    /// The transport closed; terminal
    Closed,
}

/// The duplex connection to the hosted conversational agent.
///
/// One transport instance is exclusively owned by one session. `finish`,
/// `close` and `close_stream` are the graceful-teardown ladder the
/// session walks in order, swallowing failures at each step.
#[async_trait]
pub trait AgentTransport: Send {
    /// Establish the connection
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Take the inbound event receiver. Valid once, after `connect`.
    fn events(&mut self) -> Option<mpsc::Receiver<TransportEvent>>;

    /// Send the one-time configuration message
    async fn configure(&mut self, settings: &SessionSettings) -> Result<(), TransportError>;

    /// Send one frame of microphone audio
    async fn send_audio(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Send a correlated tool-call response
    async fn send_tool_result(&mut self, result: &ToolCallResponse) -> Result<(), TransportError>;

    /// Ask the agent to finish the conversation gracefully
    async fn finish(&mut self) -> Result<(), TransportError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Best-effort close-stream message for transports that want one
    async fn close_stream(&mut self) -> Result<(), TransportError>;
}

impl SessionSettings {
    /// Build the configuration for a session: PCM16 at the wire rate in
    /// both directions, plus model selectors, instructions and greeting.
    pub fn build(
        settings: &podium_core::Settings,
        instructions: String,
        greeting: String,
    ) -> Self {
        let format = AudioFormat::new(AudioEncoding::Linear16, SampleRate::Hz24000);
        Self {
            audio: AudioConfig {
                input: format.clone(),
                output: format,
            },
            agent: AgentConfig {
                listen: ListenConfig {
                    model: settings.agent.listen_model.clone(),
                },
                think: ThinkConfig {
                    model: settings.agent.think_model.clone(),
                    instructions,
                },
                speak: SpeakConfig {
                    voice: settings.agent.voice.clone(),
                },
                greeting,
            },
        }
    }
}

//! Tool-call bridge
//!
//! The remote agent raises tool calls mid-conversation; the bridge
//! executes the corresponding backend action and answers with a
//! correlated result. Two invariants drive the design: every call id
//! gets exactly one response (the agent's reasoning loop stalls
//! otherwise), and nothing here ever runs on the inbound event path —
//! each call is handled on its own task so a slow backend cannot delay
//! audio or transcript delivery.

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use podium_core::{ConversationAnalysis, SessionEvent, TranscriptLog, Turn};

use crate::backend::AnalysisBackend;
use crate::transport::{AgentTransport, ToolCallRequest, ToolCallResponse};

/// Analyze the conversation so far
pub const TOOL_ANALYZE: &str = "analyze_conversation";
/// Durably save an analysis with its transcript
pub const TOOL_PERSIST: &str = "save_practice_history";

/// Arguments the agent may pass to the analyze call. The agent is not
/// trusted to supply complete arguments; anything missing is filled from
/// session state.
#[derive(Debug, Default, Deserialize)]
struct AnalyzeArgs {
    #[serde(default)]
    transcript: Option<Vec<Turn>>,
    #[serde(default)]
    duration_seconds: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct PersistArgs {
    #[serde(default)]
    analysis: Option<ConversationAnalysis>,
    #[serde(default)]
    transcript: Option<Vec<Turn>>,
    #[serde(default)]
    duration_seconds: Option<f64>,
}

/// Executes tool calls out-of-band and answers each one exactly once
pub struct ToolCallBridge {
    enabled: bool,
    backend: Arc<dyn AnalysisBackend>,
    transcript: Arc<TranscriptLog>,
    started_at: Instant,
    transport: Arc<tokio::sync::Mutex<Box<dyn AgentTransport>>>,
    events: mpsc::Sender<SessionEvent>,
    /// Single-slot cache of the latest analyze result, used when a
    /// persist call omits its analysis argument
    last_analysis: Mutex<Option<ConversationAnalysis>>,
}

impl ToolCallBridge {
    pub fn new(
        enabled: bool,
        backend: Arc<dyn AnalysisBackend>,
        transcript: Arc<TranscriptLog>,
        started_at: Instant,
        transport: Arc<tokio::sync::Mutex<Box<dyn AgentTransport>>>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            enabled,
            backend,
            transcript,
            started_at,
            transport,
            events,
            last_analysis: Mutex::new(None),
        }
    }

    /// Handle one tool call off the event path. The correlated response
    /// is delivered best-effort; if the transport is already gone the
    /// failure is logged and swallowed.
    pub fn dispatch(self: Arc<Self>, call: ToolCallRequest) {
        tokio::spawn(async move {
            let content = self.handle(&call).await;
            let response = ToolCallResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                content,
            };

            let mut transport = self.transport.lock().await;
            if let Err(e) = transport.send_tool_result(&response).await {
                tracing::debug!(call_id = %call.id, "tool result delivery failed: {}", e);
            }
        });
    }

    async fn handle(&self, call: &ToolCallRequest) -> serde_json::Value {
        if !self.enabled {
            tracing::warn!(tool = %call.name, "tool call received outside practice mode");
            return json!({"error": format!("tool {} is not available in this mode", call.name)});
        }

        match call.name.as_str() {
            TOOL_ANALYZE => self.handle_analyze(&call.arguments).await,
            TOOL_PERSIST => self.handle_persist(&call.arguments).await,
            other => {
                tracing::warn!(tool = %other, "unknown tool call");
                json!({"error": format!("unknown tool: {}", other)})
            },
        }
    }

    async fn handle_analyze(&self, arguments: &serde_json::Value) -> serde_json::Value {
        let args: AnalyzeArgs =
            serde_json::from_value(arguments.clone()).unwrap_or_default();
        let transcript = args
            .transcript
            .unwrap_or_else(|| self.transcript.snapshot());
        let duration = args
            .duration_seconds
            .unwrap_or_else(|| self.started_at.elapsed().as_secs_f64());

        match self
            .backend
            .analyze_conversation(&transcript, duration)
            .await
        {
            Ok(analysis) => {
                *self.last_analysis.lock() = Some(analysis.clone());
                let _ = self
                    .events
                    .send(SessionEvent::AnalysisReady(analysis.clone()))
                    .await;
                serde_json::to_value(&analysis).unwrap_or_else(|_| json!({}))
            },
            Err(e) => {
                tracing::warn!("conversation analysis failed: {}", e);
                json!({"error": e.to_string()})
            },
        }
    }

    async fn handle_persist(&self, arguments: &serde_json::Value) -> serde_json::Value {
        let args: PersistArgs =
            serde_json::from_value(arguments.clone()).unwrap_or_default();
        let analysis = match args.analysis.or_else(|| self.last_analysis.lock().clone()) {
            Some(analysis) => analysis,
            None => {
                tracing::warn!("persist requested with no analysis available");
                return json!({"error": "no analysis available to save"});
            },
        };
        let transcript = args
            .transcript
            .unwrap_or_else(|| self.transcript.snapshot());
        let duration = args
            .duration_seconds
            .unwrap_or_else(|| self.started_at.elapsed().as_secs_f64());

        match self
            .backend
            .save_practice_history(&analysis, &transcript, duration)
            .await
        {
            Ok(session_id) => {
                let _ = self
                    .events
                    .send(SessionEvent::Persisted {
                        practice_session_id: session_id.clone(),
                    })
                    .await;
                json!({"session_id": session_id})
            },
            Err(e) => {
                tracing::warn!("practice history save failed: {}", e);
                json!({"error": e.to_string()})
            },
        }
    }
}

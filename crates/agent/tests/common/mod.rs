//! Shared test doubles: a scriptable transport and an in-memory backend
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use podium_agent::backend::{AnalysisBackend, BackendError};
use podium_agent::transport::{
    AgentTransport, SessionSettings, ToolCallRequest, ToolCallResponse, TransportError,
    TransportEvent,
};
use podium_agent::PromptContext;
use podium_core::{ConversationAnalysis, Turn};

/// What the stub does when the session sends its configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureBehavior {
    /// Acknowledge with a ready signal
    Ready,
    /// Never acknowledge (start must time out)
    Silent,
    /// Emit an error event instead of the ready signal
    ErrorEvent,
}

/// Everything the session sent through the transport
#[derive(Default)]
pub struct SentLog {
    pub settings: Vec<serde_json::Value>,
    pub audio_frames: Vec<Vec<u8>>,
    pub tool_results: Vec<ToolCallResponse>,
    pub finish_calls: usize,
    pub close_calls: usize,
    pub close_stream_calls: usize,
}

/// Channel-backed transport double
pub struct StubTransport {
    behavior: ConfigureBehavior,
    injector: mpsc::Sender<TransportEvent>,
    events: Option<mpsc::Receiver<TransportEvent>>,
    log: Arc<Mutex<SentLog>>,
}

impl StubTransport {
    /// Returns the transport plus an injector for inbound events and the
    /// log of outbound traffic.
    pub fn new(
        behavior: ConfigureBehavior,
    ) -> (Self, mpsc::Sender<TransportEvent>, Arc<Mutex<SentLog>>) {
        let (tx, rx) = mpsc::channel(64);
        let log = Arc::new(Mutex::new(SentLog::default()));
        let transport = Self {
            behavior,
            injector: tx.clone(),
            events: Some(rx),
            log: Arc::clone(&log),
        };
        (transport, tx, log)
    }
}

#[async_trait]
impl AgentTransport for StubTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let _ = self.injector.try_send(TransportEvent::Opened);
        Ok(())
    }

    fn events(&mut self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.events.take()
    }

    async fn configure(&mut self, settings: &SessionSettings) -> Result<(), TransportError> {
        self.log
            .lock()
            .settings
            .push(serde_json::to_value(settings).unwrap());
        match self.behavior {
            ConfigureBehavior::Ready => {
                let _ = self.injector.try_send(TransportEvent::Ready);
            },
            ConfigureBehavior::Silent => {},
            ConfigureBehavior::ErrorEvent => {
                let _ = self.injector.try_send(TransportEvent::Error {
                    code: "HANDSHAKE".to_string(),
                    description: "configuration rejected".to_string(),
                });
            },
        }
        Ok(())
    }

    async fn send_audio(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.log.lock().audio_frames.push(frame.to_vec());
        Ok(())
    }

    async fn send_tool_result(&mut self, result: &ToolCallResponse) -> Result<(), TransportError> {
        self.log.lock().tool_results.push(result.clone());
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), TransportError> {
        self.log.lock().finish_calls += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.log.lock().close_calls += 1;
        Ok(())
    }

    async fn close_stream(&mut self) -> Result<(), TransportError> {
        self.log.lock().close_stream_calls += 1;
        Ok(())
    }
}

/// In-memory backend double
pub struct StubBackend {
    pub fail_analyze: bool,
    pub analyze_count: AtomicUsize,
    pub save_count: AtomicUsize,
}

impl StubBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_analyze: false,
            analyze_count: AtomicUsize::new(0),
            save_count: AtomicUsize::new(0),
        })
    }

    pub fn failing_analyze() -> Arc<Self> {
        Arc::new(Self {
            fail_analyze: true,
            analyze_count: AtomicUsize::new(0),
            save_count: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AnalysisBackend for StubBackend {
    async fn analyze_conversation(
        &self,
        _transcript: &[Turn],
        _duration_seconds: f64,
    ) -> Result<ConversationAnalysis, BackendError> {
        self.analyze_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_analyze {
            return Err(BackendError::Status {
                status: 500,
                body: "analysis unavailable".to_string(),
            });
        }
        Ok(ConversationAnalysis {
            summary: "stub analysis".to_string(),
            strengths: vec!["clear voice".to_string()],
            ..Default::default()
        })
    }

    async fn save_practice_history(
        &self,
        _analysis: &ConversationAnalysis,
        _transcript: &[Turn],
        _duration_seconds: f64,
    ) -> Result<String, BackendError> {
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok("practice-123".to_string())
    }
}

pub fn practice_context() -> PromptContext {
    PromptContext::Practice { scenario: None }
}

pub fn coach_context() -> PromptContext {
    PromptContext::Coach(Box::default())
}

/// Build a tool-call event
pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> TransportEvent {
    TransportEvent::ToolCall(ToolCallRequest {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    })
}

/// Build a conversation-text event
pub fn text(role: Option<&str>, content: &str) -> TransportEvent {
    TransportEvent::Text {
        role: role.map(str::to_string),
        content: content.to_string(),
    }
}

/// Wait (under the paused clock) until `check` passes or give up
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

//! Voice agent session orchestrator
//!
//! Owns the duplex transport, negotiates session configuration, and
//! multiplexes the three data planes: outbound microphone audio, inbound
//! agent audio, and structured events. The UI layer consumes one
//! [`SessionEvent`] stream; everything else stays inside.
//!
//! Lifecycle: `Idle → Connecting → Configuring → Active → Closing → Idle`,
//! with `Failed` reachable only before the session goes active. After
//! that, transport errors are telemetry — the known transports emit
//! spurious post-configuration warnings, and tearing the session down on
//! them produces false hangups.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use podium_audio::{CaptureHandle, CaptureStatus, CaptureWorker};
use podium_core::settings::ErrorSuppression;
use podium_core::{SessionEvent, Settings, TranscriptLog, TurnRole};

use crate::backend::AnalysisBackend;
use crate::prompts::{self, PromptContext};
use crate::tools::ToolCallBridge;
use crate::transport::{AgentTransport, SessionSettings, TransportEvent};
use crate::AgentError;

/// Conversation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Q&A over a completed speech analysis; no tool calls
    Coach,
    /// Conversation practice; analyze/persist tool calls enabled
    Practice,
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Configuring,
    Active,
    Closing,
    Failed,
}

type SharedTransport = Arc<tokio::sync::Mutex<Box<dyn AgentTransport>>>;

/// One live duplex conversation with the hosted agent
pub struct VoiceAgentSession {
    id: String,
    mode: SessionMode,
    state: Arc<RwLock<SessionState>>,
    transport: SharedTransport,
    transcript: Arc<TranscriptLog>,
    started_at: Instant,
    winding_down: Arc<AtomicBool>,
    stopped: AtomicBool,
    capture: CaptureHandle,
    capture_worker: tokio::sync::Mutex<Option<JoinHandle<CaptureStatus>>>,
    pump: JoinHandle<()>,
    #[allow(dead_code)]
    dispatch: JoinHandle<()>,
}

impl std::fmt::Debug for VoiceAgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceAgentSession")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl VoiceAgentSession {
    /// Open a session: build the mode-specific prompt, configure the
    /// transport, and start the audio pipeline.
    ///
    /// The returned receiver carries every event the session emits, in
    /// transport order. Microphone audio only starts flowing once the
    /// remote side has accepted configuration; if the transport does not
    /// become ready within the configured window, start fails.
    pub async fn start(
        settings: &Settings,
        context: PromptContext,
        mut transport: Box<dyn AgentTransport>,
        backend: Arc<dyn AnalysisBackend>,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>), AgentError> {
        let mode = context.mode();

        let instructions = prompts::build_system_prompt(&context);
        let budget = settings.session.prompt_char_budget;
        let len = instructions.chars().count();
        if len > budget {
            return Err(AgentError::PromptTooLarge { len, budget });
        }

        let session_settings =
            SessionSettings::build(settings, instructions, prompts::greeting(mode));

        let id = uuid::Uuid::new_v4().to_string();
        let state = Arc::new(RwLock::new(SessionState::Connecting));
        tracing::info!(session_id = %id, mode = ?mode, "starting voice session");

        let open_timeout = Duration::from_secs(settings.session.open_timeout_secs);
        let configured = tokio::time::timeout(
            open_timeout,
            Self::configure(&mut transport, &session_settings, &state),
        )
        .await;

        let events = match configured {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                *state.write() = SessionState::Failed;
                let _ = transport.close().await;
                return Err(e);
            },
            Err(_) => {
                *state.write() = SessionState::Failed;
                let _ = transport.close().await;
                return Err(AgentError::OpenTimeout(settings.session.open_timeout_secs));
            },
        };

        // Configuration acknowledged; only now may microphone audio flow.
        let transport: SharedTransport = Arc::new(tokio::sync::Mutex::new(transport));
        let transcript = Arc::new(TranscriptLog::new());
        let started_at = Instant::now();
        let winding_down = Arc::new(AtomicBool::new(false));

        let (frames_tx, mut frames_rx) = mpsc::channel::<Vec<u8>>(128);
        let (capture, capture_worker) = CaptureWorker::spawn(frames_tx);

        let pump_transport = Arc::clone(&transport);
        let pump = tokio::spawn(async move {
            while let Some(frame) = frames_rx.recv().await {
                let mut transport = pump_transport.lock().await;
                if let Err(e) = transport.send_audio(&frame).await {
                    tracing::debug!("audio frame send failed: {}", e);
                }
            }
        });

        let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(64);
        let bridge = Arc::new(ToolCallBridge::new(
            mode == SessionMode::Practice,
            backend,
            Arc::clone(&transcript),
            started_at,
            Arc::clone(&transport),
            event_tx.clone(),
        ));

        let dispatch = tokio::spawn(Self::dispatch_events(
            events,
            event_tx,
            Arc::clone(&transcript),
            bridge,
            Arc::clone(&winding_down),
            settings.suppression.clone(),
        ));

        *state.write() = SessionState::Active;

        let session = Self {
            id,
            mode,
            state,
            transport,
            transcript,
            started_at,
            winding_down,
            stopped: AtomicBool::new(false),
            capture,
            capture_worker: tokio::sync::Mutex::new(Some(capture_worker)),
            pump,
            dispatch,
        };
        Ok((session, event_rx))
    }

    /// Connect, send the configuration message, and wait for the ready
    /// signal. Any error event in this window is fatal.
    async fn configure(
        transport: &mut Box<dyn AgentTransport>,
        session_settings: &SessionSettings,
        state: &Arc<RwLock<SessionState>>,
    ) -> Result<mpsc::Receiver<TransportEvent>, AgentError> {
        transport.connect().await?;
        let mut events = transport.events().ok_or_else(|| {
            AgentError::Configuration("transport produced no event stream".to_string())
        })?;

        *state.write() = SessionState::Configuring;
        transport.configure(session_settings).await?;

        loop {
            match events.recv().await {
                Some(TransportEvent::Ready) => return Ok(events),
                Some(TransportEvent::Opened) => continue,
                Some(TransportEvent::Error { code, description }) => {
                    return Err(AgentError::Configuration(format!(
                        "{}: {}",
                        code, description
                    )));
                },
                Some(TransportEvent::Closed) | None => {
                    return Err(AgentError::Configuration(
                        "transport closed during configuration".to_string(),
                    ));
                },
                Some(_) => continue,
            }
        }
    }

    /// Forward transport events to the session's consumers, in order.
    async fn dispatch_events(
        mut events: mpsc::Receiver<TransportEvent>,
        out: mpsc::Sender<SessionEvent>,
        transcript: Arc<TranscriptLog>,
        bridge: Arc<ToolCallBridge>,
        winding_down: Arc<AtomicBool>,
        suppression: ErrorSuppression,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Text { role, content } => {
                    if content.trim().is_empty() {
                        continue;
                    }
                    // Unrecognized roles on non-empty content default to
                    // the user side.
                    let role = role
                        .as_deref()
                        .and_then(TurnRole::from_wire)
                        .unwrap_or(TurnRole::User);
                    transcript.push(role, content.clone());
                    if out
                        .send(SessionEvent::Transcript { role, content })
                        .await
                        .is_err()
                    {
                        break;
                    }
                },
                TransportEvent::Audio(bytes) => {
                    if out.send(SessionEvent::AgentAudio(bytes)).await.is_err() {
                        break;
                    }
                },
                // Handled off the event path; a slow backend must not
                // delay audio or transcript delivery.
                TransportEvent::ToolCall(call) => Arc::clone(&bridge).dispatch(call),
                TransportEvent::Error { code, description } => {
                    if winding_down.load(Ordering::SeqCst) {
                        if out
                            .send(SessionEvent::Error { code, description })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    } else if suppression.matches(&code, &description) {
                        tracing::debug!(code = %code, "suppressed transport warning: {}", description);
                    } else {
                        tracing::warn!(code = %code, "transport warning (non-fatal): {}", description);
                    }
                },
                TransportEvent::Opened | TransportEvent::Ready => {},
                TransportEvent::Closed => {
                    let _ = out.send(SessionEvent::Closed).await;
                    break;
                },
            }
        }
    }

    /// Stop the session. Idempotent and safe from any state.
    ///
    /// Teardown order: capture worker, capture pump, then the transport
    /// ladder (finish, close, close-stream). Each step's failure is
    /// logged and swallowed so the remaining steps always run.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.state.write() = SessionState::Closing;
        tracing::info!(session_id = %self.id, "stopping voice session");

        self.capture.stop();
        if let Some(worker) = self.capture_worker.lock().await.take() {
            let _ = worker.await;
        }
        self.pump.abort();

        {
            let mut transport = self.transport.lock().await;
            if let Err(e) = transport.finish().await {
                tracing::debug!("transport finish failed: {}", e);
            }
            if let Err(e) = transport.close().await {
                tracing::debug!("transport close failed: {}", e);
            }
            if let Err(e) = transport.close_stream().await {
                tracing::debug!("transport close-stream failed: {}", e);
            }
        }

        *self.state.write() = SessionState::Idle;
    }

    /// Mark that the end-of-conversation sequence has begun. From here
    /// on, transport errors are surfaced instead of logged, so the UI
    /// can tell "still live" from "agent hung up mid-close-out".
    pub fn mark_winding_down(&self) {
        self.winding_down.store(true, Ordering::SeqCst);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        *self.state.read() == SessionState::Active
    }

    /// The append-only transcript log
    pub fn transcript(&self) -> &Arc<TranscriptLog> {
        &self.transcript
    }

    /// Elapsed conversation time
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Handle for the capture device layer to post sample blocks into
    pub fn capture_handle(&self) -> CaptureHandle {
        self.capture.clone()
    }
}

//! UI-facing conversation controller
//!
//! A thin state machine that drives session lifecycle and reacts to the
//! session's event stream: it feeds agent audio to the playback
//! scheduler, cancels playback the instant the user barges in, watches
//! user turns for an end-of-conversation phrase, and makes practice
//! persistence resilient to an agent that analyzes but forgets to
//! persist.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use podium_audio::PlaybackScheduler;
use podium_core::{ConversationAnalysis, SessionEvent, Settings, TurnRole};

use crate::backend::AnalysisBackend;
use crate::prompts::PromptContext;
use crate::session::{SessionMode, VoiceAgentSession};
use crate::transport::AgentTransport;
use crate::AgentError;

/// Phrase fragments that end a practice conversation. Matching is
/// case-insensitive substring containment over the user's turn.
static END_PHRASES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "that's all",
        "thats all",
        "i'm done",
        "im done",
        "let's end",
        "lets end",
        "wrap up",
        "end the conversation",
        "stop the conversation",
        "goodbye",
        "stop",
    ]
});

/// Does this user turn signal the end of the conversation?
pub fn detects_end_phrase(content: &str) -> bool {
    let lowered = content.to_lowercase();
    END_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

/// Controller lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Connecting,
    Active,
    /// The user signaled the end; the agent is expected to speak its
    /// feedback and run the close-out tool calls
    WindingDown,
    /// The conversation ended; if persistence succeeded the saved
    /// practice session id is present
    Completed {
        practice_session_id: Option<String>,
    },
}

/// Drives one conversation at a time
pub struct ConversationController {
    settings: Settings,
    backend: Arc<dyn AnalysisBackend>,
    scheduler: PlaybackScheduler,
    state: ControllerState,
    session: Option<VoiceAgentSession>,
    events: Option<mpsc::Receiver<SessionEvent>>,
    /// Latest analysis from the agent's analyze call; single slot,
    /// overwritten by each new analysis
    pending_analysis: Option<ConversationAnalysis>,
    /// One-shot persistence guard: whichever of the agent's persist call
    /// and the fallback timer wins the compare-and-set persists; the
    /// other becomes a no-op
    persisted: AtomicBool,
    wrap_up_deadline: Option<Instant>,
    fallback_deadline: Option<Instant>,
}

impl ConversationController {
    pub fn new(
        settings: Settings,
        backend: Arc<dyn AnalysisBackend>,
        scheduler: PlaybackScheduler,
    ) -> Self {
        Self {
            settings,
            backend,
            scheduler,
            state: ControllerState::Idle,
            session: None,
            events: None,
            pending_analysis: None,
            persisted: AtomicBool::new(false),
            wrap_up_deadline: None,
            fallback_deadline: None,
        }
    }

    /// Start a conversation. Fails with [`AgentError::SessionActive`] if
    /// one is already live; the caller must stop it first.
    pub async fn start(
        &mut self,
        context: PromptContext,
        transport: Box<dyn AgentTransport>,
    ) -> Result<(), AgentError> {
        if self.session.is_some() {
            return Err(AgentError::SessionActive);
        }

        self.state = ControllerState::Connecting;
        self.pending_analysis = None;
        self.persisted.store(false, Ordering::SeqCst);
        self.wrap_up_deadline = None;
        self.fallback_deadline = None;

        match VoiceAgentSession::start(
            &self.settings,
            context,
            transport,
            Arc::clone(&self.backend),
        )
        .await
        {
            Ok((session, events)) => {
                self.session = Some(session);
                self.events = Some(events);
                self.state = ControllerState::Active;
                Ok(())
            },
            Err(e) => {
                self.state = ControllerState::Idle;
                Err(e)
            },
        }
    }

    /// Drive the conversation until it ends. Returns the final state.
    pub async fn run(&mut self) -> ControllerState {
        let mut events = match self.events.take() {
            Some(events) => events,
            None => return self.state.clone(),
        };

        loop {
            tokio::select! {
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(event) => {
                            if self.handle_event(event).await {
                                break;
                            }
                        },
                        None => {
                            self.teardown().await;
                            self.state = ControllerState::Idle;
                            break;
                        },
                    }
                },
                _ = deadline_sleep(self.wrap_up_deadline), if self.wrap_up_deadline.is_some() => {
                    tracing::warn!("agent did not complete the close-out protocol in time, forcing stop");
                    self.wrap_up_deadline = None;
                    self.teardown().await;
                    self.state = ControllerState::Completed { practice_session_id: None };
                    break;
                },
                _ = deadline_sleep(self.fallback_deadline), if self.fallback_deadline.is_some() => {
                    self.fallback_deadline = None;
                    if self.fallback_persist().await {
                        break;
                    }
                },
            }
        }

        self.state.clone()
    }

    /// React to one session event. Returns true when the conversation is
    /// over and the run loop should exit.
    async fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Transcript {
                role: TurnRole::User,
                content,
            } => {
                // Barge-in: the user's speech always wins over playback.
                if self.scheduler.is_speaking() {
                    self.scheduler.interrupt();
                }

                let practice = self
                    .session
                    .as_ref()
                    .map(|s| s.mode() == SessionMode::Practice)
                    .unwrap_or(false);
                if practice
                    && self.state == ControllerState::Active
                    && detects_end_phrase(&content)
                {
                    tracing::info!("end-of-conversation phrase detected, waiting for feedback");
                    if let Some(ref session) = self.session {
                        session.mark_winding_down();
                    }
                    self.state = ControllerState::WindingDown;
                    self.wrap_up_deadline = Some(
                        Instant::now()
                            + Duration::from_secs(self.settings.session.wrap_up_timeout_secs),
                    );
                }
                false
            },
            SessionEvent::Transcript { .. } => false,
            SessionEvent::AgentAudio(bytes) => {
                self.scheduler.enqueue(&bytes);
                false
            },
            SessionEvent::AnalysisReady(analysis) => {
                self.pending_analysis = Some(analysis);
                self.fallback_deadline = Some(
                    Instant::now()
                        + Duration::from_secs(self.settings.session.fallback_persist_secs),
                );
                false
            },
            SessionEvent::Persisted {
                practice_session_id,
            } => {
                if self
                    .persisted
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    self.fallback_deadline = None;
                    self.teardown().await;
                    self.state = ControllerState::Completed {
                        practice_session_id: Some(practice_session_id),
                    };
                    true
                } else {
                    false
                }
            },
            SessionEvent::Error { code, description } => {
                // Only delivered once the close-out sequence has begun.
                tracing::warn!(code = %code, "agent error during close-out: {}", description);
                false
            },
            SessionEvent::Closed => {
                self.teardown().await;
                self.state = ControllerState::Idle;
                true
            },
        }
    }

    /// Persist the pending analysis ourselves because the agent's
    /// persist call never arrived. Returns true if the conversation
    /// completed here.
    async fn fallback_persist(&mut self) -> bool {
        let analysis = match self.pending_analysis.clone() {
            Some(analysis) => analysis,
            None => return false,
        };
        let (transcript, duration) = match self.session.as_ref() {
            Some(session) if session.is_active() => (
                session.transcript().snapshot(),
                session.elapsed().as_secs_f64(),
            ),
            _ => return false,
        };
        if self
            .persisted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        tracing::info!("agent did not persist the analysis, saving it directly");
        match self
            .backend
            .save_practice_history(&analysis, &transcript, duration)
            .await
        {
            Ok(practice_session_id) => {
                self.teardown().await;
                self.state = ControllerState::Completed {
                    practice_session_id: Some(practice_session_id),
                };
                true
            },
            Err(e) => {
                tracing::warn!("fallback persistence failed: {}", e);
                false
            },
        }
    }

    /// Stop the conversation. Safe to call whether or not one is live;
    /// this is also how a coach-mode conversation ends.
    pub async fn stop(&mut self) {
        self.wrap_up_deadline = None;
        self.fallback_deadline = None;
        self.events = None;
        self.teardown().await;
        self.state = ControllerState::Idle;
    }

    /// Release the session and playback resources, in that order.
    async fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop().await;
        }
        self.scheduler.interrupt();
    }

    pub fn state(&self) -> ControllerState {
        self.state.clone()
    }

    /// Capture handle of the live session, if any
    pub fn capture_handle(&self) -> Option<podium_audio::CaptureHandle> {
        self.session.as_ref().map(|s| s.capture_handle())
    }
}

/// A sleep that only fires when a deadline is armed; guarded branches in
/// the run loop never poll the disarmed case.
fn deadline_sleep(at: Option<Instant>) -> tokio::time::Sleep {
    tokio::time::sleep_until(at.unwrap_or_else(Instant::now))
}

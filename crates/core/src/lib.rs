//! Core types for the voice coaching session
//!
//! This crate provides foundational types used across the other crates:
//! - PCM16 audio conversion and frame math
//! - Conversation turns and the append-only transcript log
//! - Analysis payload types shared with the coaching backend
//! - The session event union delivered to the UI layer
//! - Application settings

pub mod analysis;
pub mod audio;
pub mod conversation;
pub mod events;
pub mod settings;

pub use analysis::{ConversationAnalysis, EmotionSegment, SpeechAnalysisBundle};
pub use audio::{
    f32_from_pcm16, pcm16_duration, pcm16_from_f32, AudioEncoding, SampleRate, BYTES_PER_SAMPLE,
};
pub use conversation::{Turn, TurnRole, TranscriptLog};
pub use events::SessionEvent;
pub use settings::{
    BackendSettings, ErrorSuppression, ModelSettings, SessionTuning, Settings, SettingsError,
};

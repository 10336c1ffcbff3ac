//! Analysis payload types
//!
//! `ConversationAnalysis` is what the coaching backend returns for a
//! practice conversation; `SpeechAnalysisBundle` is the pre-computed
//! speech-analysis material a coach-mode session is seeded with.

use serde::{Deserialize, Serialize};

/// Structured analysis of a practice conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConversationAnalysis {
    /// Overall summary of the conversation
    #[serde(default)]
    pub summary: String,
    /// What went well
    #[serde(default)]
    pub strengths: Vec<String>,
    /// What needs work
    #[serde(default)]
    pub improvement_areas: Vec<String>,
    /// Concrete coaching tips
    #[serde(default)]
    pub coaching_tips: Vec<String>,
    /// Optional numeric scores keyed by dimension (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<serde_json::Value>,
}

/// One span of the emotion timeline, e.g. `"00:10-00:25"` / `"confident"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionSegment {
    pub time_range: String,
    pub emotion: String,
}

/// Speech-analysis material for seeding a coach-mode conversation.
///
/// Produced by the upload/analysis flow; the coach prompt is built from
/// this bundle once at session start.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpeechAnalysisBundle {
    /// Total speech duration in seconds
    pub duration_seconds: f64,
    /// Average speaking rate in words per second
    pub speaking_rate_wps: f64,
    /// Clarity score (0-100)
    pub clarity_score: f64,
    /// Most frequent emotion across the timeline
    #[serde(default)]
    pub dominant_emotion: String,
    /// Time-ordered emotion segments
    #[serde(default)]
    pub emotion_timeline: Vec<EmotionSegment>,
    /// Selected transcript excerpts
    #[serde(default)]
    pub transcript_excerpts: Vec<String>,
    /// Prior textual analysis, if one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_analysis: Option<String>,
}

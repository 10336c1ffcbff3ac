//! Mode-specific system prompt construction
//!
//! The prompt is built once at session start and is immutable for the
//! session's lifetime. Coach mode seeds the agent with the user's
//! speech-analysis material; practice mode sets up the conversation
//! partner plus the close-out protocol (spoken feedback, then the
//! analyze and persist tool calls).

use podium_core::SpeechAnalysisBundle;

use crate::session::SessionMode;
use crate::tools::{TOOL_ANALYZE, TOOL_PERSIST};

/// What the session is seeded with, by mode
#[derive(Debug, Clone)]
pub enum PromptContext {
    /// Free-form Q&A over a completed speech analysis
    Coach(Box<SpeechAnalysisBundle>),
    /// Conversation practice with an optional scenario
    Practice { scenario: Option<String> },
}

impl PromptContext {
    pub fn mode(&self) -> SessionMode {
        match self {
            PromptContext::Coach(_) => SessionMode::Coach,
            PromptContext::Practice { .. } => SessionMode::Practice,
        }
    }
}

/// Speaking-rate bounds beyond which the prompt flags pacing
const FAST_WPS: f64 = 3.0;
const SLOW_WPS: f64 = 1.0;

/// Build the system prompt for a session
pub fn build_system_prompt(context: &PromptContext) -> String {
    match context {
        PromptContext::Coach(bundle) => coach_prompt(bundle),
        PromptContext::Practice { scenario } => practice_prompt(scenario.as_deref()),
    }
}

/// The greeting the agent speaks as soon as the session is live
pub fn greeting(mode: SessionMode) -> String {
    match mode {
        SessionMode::Coach => {
            "Hi! I've gone through your speech. Ask me anything about how it went.".to_string()
        },
        SessionMode::Practice => {
            "Hi! I'm ready to chat whenever you are. Just say the word when you'd like to wrap up."
                .to_string()
        },
    }
}

fn coach_prompt(bundle: &SpeechAnalysisBundle) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(
        "You are a supportive, direct speech coach. The user has just uploaded a recorded \
         speech and received the analysis below. Answer their questions about the recording, \
         point at concrete moments, and suggest specific exercises. Keep answers short and \
         conversational; they are spoken aloud.\n\n",
    );

    prompt.push_str("Recording overview:\n");
    prompt.push_str(&format!(
        "- Duration: {}\n",
        format_time(bundle.duration_seconds)
    ));

    let pacing_note = if bundle.speaking_rate_wps > FAST_WPS {
        " (notably fast)"
    } else if bundle.speaking_rate_wps < SLOW_WPS {
        " (notably slow)"
    } else {
        ""
    };
    prompt.push_str(&format!(
        "- Average speaking rate: {:.2} words/sec{}\n",
        bundle.speaking_rate_wps, pacing_note
    ));
    prompt.push_str(&format!("- Clarity score: {:.0}/100\n", bundle.clarity_score));
    if !bundle.dominant_emotion.is_empty() {
        prompt.push_str(&format!("- Dominant emotion: {}\n", bundle.dominant_emotion));
    }

    if !bundle.emotion_timeline.is_empty() {
        prompt.push_str("\nEmotion timeline:\n");
        for segment in &bundle.emotion_timeline {
            prompt.push_str(&format!("{}: {}\n", segment.time_range, segment.emotion));
        }
    }

    if !bundle.transcript_excerpts.is_empty() {
        prompt.push_str("\nTranscript excerpts:\n");
        for excerpt in &bundle.transcript_excerpts {
            prompt.push_str(&format!("- \"{}\"\n", excerpt));
        }
    }

    if let Some(ref prior) = bundle.prior_analysis {
        prompt.push_str("\nPrior written analysis:\n");
        prompt.push_str(prior);
        prompt.push('\n');
    }

    prompt
}

fn practice_prompt(scenario: Option<&str>) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(
        "You are a friendly conversation partner helping the user practice everyday \
         speaking. Converse naturally on whatever they bring up, keeping your responses \
         brief and spoken-style.\n\n",
    );

    if let Some(scenario) = scenario {
        prompt.push_str("Scenario for this practice session:\n");
        prompt.push_str(scenario);
        prompt.push_str("\n\n");
    }

    prompt.push_str(
        "While you talk, silently evaluate the user's conversational quality: clarity, \
         confidence, pacing and engagement. Never mention this evaluation mid-conversation.\n\n",
    );

    prompt.push_str(&format!(
        "When the user signals they are done (for example \"that's all\" or \"let's end\"), \
         do the following in order: first speak brief, honest critical feedback on how they \
         did; then call the {analyze} tool; then call the {persist} tool with the analysis \
         it returned. The session ends after both calls complete.",
        analyze = TOOL_ANALYZE,
        persist = TOOL_PERSIST,
    ));

    prompt
}

/// Format seconds as mm:ss
fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

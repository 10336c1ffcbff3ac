//! Analysis backend client
//!
//! The backend analyzes practice conversations and stores practice
//! history. The trait is the seam the tool bridge and controller work
//! against; [`HttpAnalysisBackend`] is the production client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use podium_core::{BackendSettings, ConversationAnalysis, Turn};

/// Backend call errors
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Conversation analysis and persistence operations
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Analyze a completed (or in-progress) practice conversation
    async fn analyze_conversation(
        &self,
        transcript: &[Turn],
        duration_seconds: f64,
    ) -> Result<ConversationAnalysis, BackendError>;

    /// Durably save an analysis with its transcript; returns the stored
    /// practice session id
    async fn save_practice_history(
        &self,
        analysis: &ConversationAnalysis,
        transcript: &[Turn],
        duration_seconds: f64,
    ) -> Result<String, BackendError>;
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    analysis: ConversationAnalysis,
}

#[derive(Deserialize)]
struct SaveResponse {
    session_id: String,
}

/// HTTP client for the analysis API
pub struct HttpAnalysisBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisBackend {
    pub fn new(settings: &BackendSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, BackendError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisBackend {
    async fn analyze_conversation(
        &self,
        transcript: &[Turn],
        duration_seconds: f64,
    ) -> Result<ConversationAnalysis, BackendError> {
        let response: AnalyzeResponse = self
            .post_json(
                "analyze-conversation",
                json!({
                    "transcript": transcript,
                    "duration_seconds": duration_seconds,
                }),
            )
            .await?;
        tracing::debug!(
            turns = transcript.len(),
            duration_seconds,
            "conversation analyzed"
        );
        Ok(response.analysis)
    }

    async fn save_practice_history(
        &self,
        analysis: &ConversationAnalysis,
        transcript: &[Turn],
        duration_seconds: f64,
    ) -> Result<String, BackendError> {
        let response: SaveResponse = self
            .post_json(
                "save-practice-history",
                json!({
                    "analysis": analysis,
                    "transcript": transcript,
                    "duration_seconds": duration_seconds,
                }),
            )
            .await?;
        tracing::info!(session_id = %response.session_id, "practice history saved");
        Ok(response.session_id)
    }
}

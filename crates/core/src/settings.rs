//! Application settings
//!
//! Loaded from an optional settings file with environment-variable
//! overrides. Priority: env vars > settings file > defaults.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings loading errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Conversational agent configuration
    #[serde(default)]
    pub agent: ModelSettings,

    /// Analysis backend configuration
    #[serde(default)]
    pub backend: BackendSettings,

    /// Session timing and limits
    #[serde(default)]
    pub session: SessionTuning,

    /// Post-configuration transport error suppression
    #[serde(default)]
    pub suppression: ErrorSuppression,
}

/// Remote agent endpoint and model selectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Agent WebSocket endpoint
    #[serde(default = "default_agent_endpoint")]
    pub endpoint: String,

    /// Listening (speech recognition) model
    #[serde(default = "default_listen_model")]
    pub listen_model: String,

    /// Reasoning/response model
    #[serde(default = "default_think_model")]
    pub think_model: String,

    /// Speech-synthesis voice
    #[serde(default = "default_voice")]
    pub voice: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            endpoint: default_agent_endpoint(),
            listen_model: default_listen_model(),
            think_model: default_think_model(),
            voice: default_voice(),
        }
    }
}

/// Analysis backend endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL of the analysis API
    #[serde(default = "default_backend_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_base_url(),
            timeout_secs: default_backend_timeout_secs(),
        }
    }
}

/// Session timing and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTuning {
    /// How long to wait for transport open + configuration ack
    #[serde(default = "default_open_timeout_secs")]
    pub open_timeout_secs: u64,

    /// Maximum system prompt size in characters
    #[serde(default = "default_prompt_char_budget")]
    pub prompt_char_budget: usize,

    /// How long to wait for the agent's close-out after the user signals
    /// the end of a practice conversation
    #[serde(default = "default_wrap_up_timeout_secs")]
    pub wrap_up_timeout_secs: u64,

    /// How long to wait for the agent's persist call before persisting
    /// the pending analysis ourselves
    #[serde(default = "default_fallback_persist_secs")]
    pub fallback_persist_secs: u64,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            open_timeout_secs: default_open_timeout_secs(),
            prompt_char_budget: default_prompt_char_budget(),
            wrap_up_timeout_secs: default_wrap_up_timeout_secs(),
            fallback_persist_secs: default_fallback_persist_secs(),
        }
    }
}

/// Which post-configuration transport errors are demoted to debug logs.
///
/// Some transports emit spurious warnings after a session is live; the
/// list is data because it encodes transport quirks, not protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorSuppression {
    /// Error codes to suppress outright
    #[serde(default = "default_suppressed_codes")]
    pub codes: Vec<String>,

    /// Description substrings to suppress
    #[serde(default = "default_suppressed_substrings")]
    pub description_substrings: Vec<String>,
}

impl Default for ErrorSuppression {
    fn default() -> Self {
        Self {
            codes: default_suppressed_codes(),
            description_substrings: default_suppressed_substrings(),
        }
    }
}

impl ErrorSuppression {
    /// Should this error be demoted to a debug log?
    pub fn matches(&self, code: &str, description: &str) -> bool {
        self.codes.iter().any(|c| c == code)
            || self
                .description_substrings
                .iter()
                .any(|s| description.contains(s.as_str()))
    }
}

impl Settings {
    /// Load settings from `{path}.{yaml,toml,json}` (optional) with
    /// `PODIUM_`-prefixed environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let config = builder
            .add_source(Environment::with_prefix("PODIUM").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

fn default_agent_endpoint() -> String {
    "wss://agent.deepgram.com/agent".to_string()
}

fn default_listen_model() -> String {
    "nova-2".to_string()
}

fn default_think_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_voice() -> String {
    "aura-asteria-en".to_string()
}

fn default_backend_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_backend_timeout_secs() -> u64 {
    30
}

fn default_open_timeout_secs() -> u64 {
    10
}

fn default_prompt_char_budget() -> usize {
    25_000
}

fn default_wrap_up_timeout_secs() -> u64 {
    30
}

fn default_fallback_persist_secs() -> u64 {
    8
}

fn default_suppressed_codes() -> Vec<String> {
    vec!["INVALID_SETTINGS".to_string()]
}

fn default_suppressed_substrings() -> Vec<String> {
    vec!["Buffer".to_string()]
}

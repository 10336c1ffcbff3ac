//! Practice-session smoke client
//!
//! Runs a practice conversation against the configured agent endpoint
//! and analysis backend, feeding silence as microphone input. Useful for
//! exercising the full pipeline without a browser front end:
//!
//! ```text
//! PODIUM_AGENT_API_KEY=... podium-practice [settings-file]
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use podium_agent::{ConversationController, HttpAnalysisBackend, PromptContext, WsTransport};
use podium_audio::{PlaybackScheduler, SinkCommand};
use podium_core::{SampleRate, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "podium=info".into()),
        )
        .init();

    let settings = Settings::load(std::env::args().nth(1).as_deref())?;
    let api_key = std::env::var("PODIUM_AGENT_API_KEY").ok();

    let backend = Arc::new(HttpAnalysisBackend::new(&settings.backend));

    // This client has no speakers; log the playback schedule instead.
    let (sink_tx, mut sink_rx) = mpsc::channel(64);
    tokio::spawn(async move {
        while let Some(command) = sink_rx.recv().await {
            match command {
                SinkCommand::Play { samples, .. } => {
                    tracing::debug!("agent audio scheduled: {} samples", samples.len());
                },
                SinkCommand::CancelAll => tracing::debug!("playback cancelled"),
            }
        }
    });
    let scheduler = PlaybackScheduler::new(SampleRate::Hz24000, sink_tx);

    let transport = WsTransport::new(settings.agent.endpoint.clone(), api_key);
    let mut controller = ConversationController::new(settings, backend, scheduler);
    controller
        .start(
            PromptContext::Practice { scenario: None },
            Box::new(transport),
        )
        .await?;
    tracing::info!("session live, streaming silence as microphone input");

    // Stand-in microphone: 20ms blocks of silence at the wire rate.
    if let Some(capture) = controller.capture_handle() {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(20));
            loop {
                ticker.tick().await;
                capture.post_block(vec![0.0f32; 480]);
            }
        });
    }

    tokio::select! {
        state = controller.run() => {
            tracing::info!(state = ?state, "conversation ended");
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, stopping session");
        },
    }
    controller.stop().await;

    Ok(())
}

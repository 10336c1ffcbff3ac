//! Session-level integration tests over a scriptable transport

mod common;

use std::time::Duration;

use podium_agent::transport::TransportEvent;
use podium_agent::{AgentError, PromptContext, SessionState, VoiceAgentSession};
use podium_core::{pcm16_from_f32, SessionEvent, Settings, TurnRole};

use common::*;

#[tokio::test(start_paused = true)]
async fn test_start_rejects_oversized_prompt() {
    let (transport, _tx, _log) = StubTransport::new(ConfigureBehavior::Ready);
    let context = PromptContext::Practice {
        scenario: Some("x".repeat(30_000)),
    };

    let err = VoiceAgentSession::start(
        &Settings::default(),
        context,
        Box::new(transport),
        StubBackend::new(),
    )
    .await
    .unwrap_err();

    match err {
        AgentError::PromptTooLarge { len, budget } => {
            assert!(len > budget);
            assert_eq!(budget, 25_000);
        },
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_times_out_when_transport_never_opens() {
    let (transport, _tx, _log) = StubTransport::new(ConfigureBehavior::Silent);

    let err = VoiceAgentSession::start(
        &Settings::default(),
        practice_context(),
        Box::new(transport),
        StubBackend::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AgentError::OpenTimeout(10)));
}

#[tokio::test(start_paused = true)]
async fn test_error_before_ready_is_fatal() {
    let (transport, _tx, _log) = StubTransport::new(ConfigureBehavior::ErrorEvent);

    let err = VoiceAgentSession::start(
        &Settings::default(),
        practice_context(),
        Box::new(transport),
        StubBackend::new(),
    )
    .await
    .unwrap_err();

    match err {
        AgentError::Configuration(message) => assert!(message.contains("HANDSHAKE")),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_configuration_is_sent_before_any_audio() {
    let (transport, _tx, log) = StubTransport::new(ConfigureBehavior::Ready);

    let (session, _events) = VoiceAgentSession::start(
        &Settings::default(),
        practice_context(),
        Box::new(transport),
        StubBackend::new(),
    )
    .await
    .unwrap();

    {
        let log = log.lock();
        assert_eq!(log.settings.len(), 1);
        assert!(log.audio_frames.is_empty());
        assert_eq!(log.settings[0]["audio"]["input"]["sample_rate"], 24000);
    }

    // Microphone blocks posted after ready flow through as PCM16 frames.
    let block = vec![0.5f32; 128];
    session.capture_handle().post_block(block.clone());
    wait_until(|| !log.lock().audio_frames.is_empty()).await;
    assert_eq!(log.lock().audio_frames[0], pcm16_from_f32(&block));

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_transcript_preserves_order_and_defaults_role_to_user() {
    let (transport, tx, _log) = StubTransport::new(ConfigureBehavior::Ready);

    let (session, mut events) = VoiceAgentSession::start(
        &Settings::default(),
        practice_context(),
        Box::new(transport),
        StubBackend::new(),
    )
    .await
    .unwrap();

    tx.send(text(Some("user"), "hello")).await.unwrap();
    tx.send(TransportEvent::Audio(vec![0u8; 4800])).await.unwrap();
    tx.send(text(Some("agent"), "hi there")).await.unwrap();
    tx.send(text(None, "mystery voice")).await.unwrap();
    tx.send(text(Some("narrator"), "  ")).await.unwrap(); // empty: dropped
    tx.send(text(Some("narrator"), "plot twist")).await.unwrap();

    let mut transcripts = Vec::new();
    let mut audio_chunks = 0;
    while transcripts.len() < 4 {
        match events.recv().await.unwrap() {
            SessionEvent::Transcript { role, content } => transcripts.push((role, content)),
            SessionEvent::AgentAudio(_) => audio_chunks += 1,
            other => panic!("unexpected event: {:?}", other),
        }
    }

    assert_eq!(audio_chunks, 1);
    assert_eq!(transcripts[0], (TurnRole::User, "hello".to_string()));
    assert_eq!(transcripts[1], (TurnRole::Assistant, "hi there".to_string()));
    assert_eq!(transcripts[2], (TurnRole::User, "mystery voice".to_string()));
    assert_eq!(transcripts[3], (TurnRole::User, "plot twist".to_string()));

    let turns = session.transcript().snapshot();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[1].role, TurnRole::Assistant);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_every_tool_call_gets_exactly_one_correlated_result() {
    let (transport, tx, log) = StubTransport::new(ConfigureBehavior::Ready);
    let backend = StubBackend::new();

    let (session, mut events) = VoiceAgentSession::start(
        &Settings::default(),
        practice_context(),
        Box::new(transport),
        backend.clone(),
    )
    .await
    .unwrap();

    tx.send(tool_call("c1", "analyze_conversation", serde_json::json!({})))
        .await
        .unwrap();
    tx.send(tool_call("c2", "book_flight", serde_json::json!({})))
        .await
        .unwrap();

    wait_until(|| log.lock().tool_results.len() == 2).await;

    let results = log.lock();
    let mut ids: Vec<&str> = results.tool_results.iter().map(|r| r.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["c1", "c2"]);

    let unknown = results
        .tool_results
        .iter()
        .find(|r| r.id == "c2")
        .unwrap();
    assert!(unknown.content["error"]
        .as_str()
        .unwrap()
        .contains("unknown tool"));
    drop(results);

    // The successful analyze surfaced its analysis to the session stream.
    match events.recv().await.unwrap() {
        SessionEvent::AnalysisReady(analysis) => assert_eq!(analysis.summary, "stub analysis"),
        other => panic!("unexpected event: {:?}", other),
    }

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_backend_failure_still_answers_the_call() {
    let (transport, tx, log) = StubTransport::new(ConfigureBehavior::Ready);
    let backend = StubBackend::failing_analyze();

    let (session, _events) = VoiceAgentSession::start(
        &Settings::default(),
        practice_context(),
        Box::new(transport),
        backend,
    )
    .await
    .unwrap();

    tx.send(tool_call("c7", "analyze_conversation", serde_json::json!({})))
        .await
        .unwrap();

    wait_until(|| log.lock().tool_results.len() == 1).await;
    let results = log.lock();
    assert_eq!(results.tool_results[0].id, "c7");
    assert!(results.tool_results[0].content["error"].is_string());
    drop(results);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_tool_calls_answered_with_error_outside_practice_mode() {
    let (transport, tx, log) = StubTransport::new(ConfigureBehavior::Ready);

    let (session, _events) = VoiceAgentSession::start(
        &Settings::default(),
        coach_context(),
        Box::new(transport),
        StubBackend::new(),
    )
    .await
    .unwrap();

    tx.send(tool_call("c1", "analyze_conversation", serde_json::json!({})))
        .await
        .unwrap();

    wait_until(|| log.lock().tool_results.len() == 1).await;
    assert!(log.lock().tool_results[0].content["error"]
        .as_str()
        .unwrap()
        .contains("not available"));

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_post_ready_errors_are_telemetry_until_winding_down() {
    let (transport, tx, _log) = StubTransport::new(ConfigureBehavior::Ready);

    let (session, mut events) = VoiceAgentSession::start(
        &Settings::default(),
        practice_context(),
        Box::new(transport),
        StubBackend::new(),
    )
    .await
    .unwrap();
    assert_eq!(session.state(), SessionState::Active);

    // Suppressed and merely-logged errors never reach the stream.
    tx.send(TransportEvent::Error {
        code: "INVALID_SETTINGS".to_string(),
        description: "spurious".to_string(),
    })
    .await
    .unwrap();
    tx.send(TransportEvent::Error {
        code: "SOMETHING".to_string(),
        description: "Buffer underrun".to_string(),
    })
    .await
    .unwrap();
    tx.send(TransportEvent::Error {
        code: "OTHER".to_string(),
        description: "hiccup".to_string(),
    })
    .await
    .unwrap();
    tx.send(text(Some("user"), "ping")).await.unwrap();

    match events.recv().await.unwrap() {
        SessionEvent::Transcript { content, .. } => assert_eq!(content, "ping"),
        other => panic!("errors should have been telemetry, got {:?}", other),
    }

    // Once the close-out sequence begins, errors are surfaced.
    session.mark_winding_down();
    tx.send(TransportEvent::Error {
        code: "AGENT_GONE".to_string(),
        description: "hung up".to_string(),
    })
    .await
    .unwrap();

    match events.recv().await.unwrap() {
        SessionEvent::Error { code, .. } => assert_eq!(code, "AGENT_GONE"),
        other => panic!("unexpected event: {:?}", other),
    }

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent_and_walks_the_full_ladder() {
    let (transport, _tx, log) = StubTransport::new(ConfigureBehavior::Ready);

    let (session, _events) = VoiceAgentSession::start(
        &Settings::default(),
        practice_context(),
        Box::new(transport),
        StubBackend::new(),
    )
    .await
    .unwrap();

    session.stop().await;
    session.stop().await;

    let log = log.lock();
    assert_eq!(log.finish_calls, 1);
    assert_eq!(log.close_calls, 1);
    assert_eq!(log.close_stream_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn test_closed_event_terminates_the_stream() {
    let (transport, tx, _log) = StubTransport::new(ConfigureBehavior::Ready);

    let (session, mut events) = VoiceAgentSession::start(
        &Settings::default(),
        practice_context(),
        Box::new(transport),
        StubBackend::new(),
    )
    .await
    .unwrap();

    tx.send(TransportEvent::Closed).await.unwrap();

    assert!(matches!(events.recv().await, Some(SessionEvent::Closed)));
    assert!(events.recv().await.is_none());

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_duration_is_tracked() {
    let (transport, _tx, _log) = StubTransport::new(ConfigureBehavior::Ready);

    let (session, _events) = VoiceAgentSession::start(
        &Settings::default(),
        practice_context(),
        Box::new(transport),
        StubBackend::new(),
    )
    .await
    .unwrap();

    assert!(session.elapsed() < Duration::from_secs(5));
    session.stop().await;
}

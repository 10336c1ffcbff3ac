//! WebSocket transport adapter
//!
//! Implements [`AgentTransport`] over a tokio-tungstenite client
//! connection. All wire normalization happens here: binary frames and
//! base64 text payloads both become plain audio byte buffers, and
//! tool-call events are validated against the strict schema before the
//! session sees them.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::transport::{
    AgentTransport, SessionSettings, ToolCallRequest, ToolCallResponse, TransportError,
    TransportEvent,
};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// WebSocket connection to the hosted agent
pub struct WsTransport {
    url: String,
    api_key: Option<String>,
    sink: Option<WsSink>,
    events: Option<mpsc::Receiver<TransportEvent>>,
    reader: Option<JoinHandle<()>>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
            sink: None,
            events: None,
            reader: None,
        }
    }

    fn sink(&mut self) -> Result<&mut WsSink, TransportError> {
        self.sink.as_mut().ok_or(TransportError::Closed)
    }

    async fn send_json(&mut self, value: serde_json::Value) -> Result<(), TransportError> {
        self.sink()?
            .send(Message::Text(value.to_string()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

#[async_trait::async_trait]
impl AgentTransport for WsTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut request = self
            .url
            .clone()
            .into_client_request()
            .map_err(|e| TransportError::Connect(format!("bad endpoint {}: {}", self.url, e)))?;

        if let Some(ref key) = self.api_key {
            use tokio_tungstenite::tungstenite::http::HeaderValue;
            let value = HeaderValue::from_str(&format!("Token {}", key))
                .map_err(|e| TransportError::Connect(format!("bad api key: {}", e)))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (ws, _response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::info!(endpoint = %self.url, "agent transport connected");

        let (sink, mut stream) = ws.split();
        let (event_tx, event_rx) = mpsc::channel(256);

        let _ = event_tx.try_send(TransportEvent::Opened);

        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = normalize_text_message(&text) {
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    },
                    Ok(Message::Binary(data)) => {
                        // Zero-length payloads are dropped silently.
                        if !data.is_empty()
                            && event_tx.send(TransportEvent::Audio(data)).await.is_err()
                        {
                            break;
                        }
                    },
                    Ok(Message::Close(_)) => {
                        let _ = event_tx.send(TransportEvent::Closed).await;
                        return;
                    },
                    Ok(_) => {},
                    Err(e) => {
                        let _ = event_tx
                            .send(TransportEvent::Error {
                                code: "transport".to_string(),
                                description: e.to_string(),
                            })
                            .await;
                        let _ = event_tx.send(TransportEvent::Closed).await;
                        return;
                    },
                }
            }
            let _ = event_tx.send(TransportEvent::Closed).await;
        });

        self.sink = Some(sink);
        self.events = Some(event_rx);
        self.reader = Some(reader);
        Ok(())
    }

    fn events(&mut self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.events.take()
    }

    async fn configure(&mut self, settings: &SessionSettings) -> Result<(), TransportError> {
        let mut payload = serde_json::to_value(settings)
            .map_err(|e| TransportError::Send(format!("settings encode: {}", e)))?;
        payload["type"] = json!("settings");
        self.send_json(payload).await
    }

    async fn send_audio(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.sink()?
            .send(Message::Binary(frame.to_vec()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn send_tool_result(&mut self, result: &ToolCallResponse) -> Result<(), TransportError> {
        self.send_json(json!({
            "type": "function_call_response",
            "id": result.id,
            "name": result.name,
            "content": result.content,
        }))
        .await
    }

    async fn finish(&mut self) -> Result<(), TransportError> {
        self.send_json(json!({"type": "finish"})).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
        match self.sink.take() {
            Some(mut sink) => sink
                .close()
                .await
                .map_err(|e| TransportError::Send(e.to_string())),
            None => Ok(()),
        }
    }

    async fn close_stream(&mut self) -> Result<(), TransportError> {
        self.send_json(json!({"type": "close_stream"})).await
    }
}

/// Normalize one inbound text frame into a transport event.
///
/// Unknown event types return None and are ignored; tool-call events
/// that fail the schema become protocol errors rather than guesses.
fn normalize_text_message(text: &str) -> Option<TransportEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("ignoring unparseable frame: {}", e);
            return None;
        },
    };

    let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or("");
    match kind {
        "welcome" => None,
        "settings_applied" => Some(TransportEvent::Ready),
        "conversation_text" => {
            let role = value
                .get("role")
                .and_then(|r| r.as_str())
                .map(str::to_string);
            let content = value
                .get("content")
                .and_then(|c| c.as_str())
                .unwrap_or("")
                .to_string();
            Some(TransportEvent::Text { role, content })
        },
        "agent_audio" => {
            let encoded = value.get("data").and_then(|d| d.as_str())?;
            match BASE64.decode(encoded) {
                Ok(bytes) if !bytes.is_empty() => Some(TransportEvent::Audio(bytes)),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!("dropping undecodable audio payload: {}", e);
                    None
                },
            }
        },
        "function_call_request" => match serde_json::from_value::<ToolCallRequest>(value.clone()) {
            Ok(call) => Some(TransportEvent::ToolCall(call)),
            Err(e) => Some(TransportEvent::Error {
                code: "protocol_error".to_string(),
                description: format!("malformed tool call event: {}", e),
            }),
        },
        "error" => Some(TransportEvent::Error {
            code: value
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("unknown")
                .to_string(),
            description: value
                .get("description")
                .or_else(|| value.get("message"))
                .and_then(|d| d.as_str())
                .unwrap_or("")
                .to_string(),
        }),
        other => {
            tracing::debug!("ignoring {} event", other);
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_applied_becomes_ready() {
        let event = normalize_text_message(r#"{"type": "settings_applied"}"#);
        assert!(matches!(event, Some(TransportEvent::Ready)));
    }

    #[test]
    fn test_conversation_text_keeps_raw_role() {
        let event =
            normalize_text_message(r#"{"type": "conversation_text", "role": "agent", "content": "hi"}"#)
                .unwrap();
        match event {
            TransportEvent::Text { role, content } => {
                assert_eq!(role.as_deref(), Some("agent"));
                assert_eq!(content, "hi");
            },
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_base64_audio_is_normalized_to_bytes() {
        let event =
            normalize_text_message(r#"{"type": "agent_audio", "data": "AAABAA=="}"#).unwrap();
        match event {
            TransportEvent::Audio(bytes) => assert_eq!(bytes, vec![0, 0, 1, 0]),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_empty_or_invalid_audio_is_dropped() {
        assert!(normalize_text_message(r#"{"type": "agent_audio", "data": ""}"#).is_none());
        assert!(normalize_text_message(r#"{"type": "agent_audio", "data": "!!"}"#).is_none());
        assert!(normalize_text_message(r#"{"type": "agent_audio"}"#).is_none());
    }

    #[test]
    fn test_malformed_tool_call_is_a_protocol_error() {
        let event = normalize_text_message(
            r#"{"type": "function_call_request", "name": "analyze_conversation"}"#,
        )
        .unwrap();
        match event {
            TransportEvent::Error { code, .. } => assert_eq!(code, "protocol_error"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_valid_tool_call_passes_schema() {
        let event = normalize_text_message(
            r#"{"type": "function_call_request", "id": "c1", "name": "analyze_conversation", "arguments": {"duration_seconds": 12.0}}"#,
        )
        .unwrap();
        match event {
            TransportEvent::ToolCall(call) => {
                assert_eq!(call.id, "c1");
                assert_eq!(call.arguments["duration_seconds"], 12.0);
            },
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_types_are_ignored() {
        assert!(normalize_text_message(r#"{"type": "user_started_speaking"}"#).is_none());
        assert!(normalize_text_message("not json").is_none());
    }

    #[test]
    fn test_error_event_extracts_code_and_description() {
        let event = normalize_text_message(
            r#"{"type": "error", "code": "INVALID_SETTINGS", "description": "bad rate"}"#,
        )
        .unwrap();
        match event {
            TransportEvent::Error { code, description } => {
                assert_eq!(code, "INVALID_SETTINGS");
                assert_eq!(description, "bad rate");
            },
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

//! Server-Sent Events support

use super::types::{ConversationView, MessageView};
use crate::runtime::SseEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init_event: SseEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(sse_event_to_axum(init_event)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(sse_event_to_axum(event))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn sse_event_to_axum(event: SseEvent) -> Event {
    let (event_type, data) = sse_event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}

fn sse_event_payload(event: SseEvent) -> (&'static str, serde_json::Value) {
    match event {
        SseEvent::Init { snapshot } => (
            "init",
            json!({
                "type": "init",
                "conversation": ConversationView::from(&snapshot)
            }),
        ),
        SseEvent::Fragment { agent, text } => (
            "fragment",
            json!({
                "type": "fragment",
                "agent": agent,
                "text": text
            }),
        ),
        SseEvent::Message { message } => (
            "message",
            json!({
                "type": "message",
                "message": MessageView::from(&message)
            }),
        ),
        SseEvent::StateChange { status, reason } => (
            "state_change",
            json!({
                "type": "state_change",
                "status": status,
                "reason": reason
            }),
        ),
        SseEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{AgentLabel, ConvStatus, Message};
    use chrono::Local;

    #[test]
    fn test_fragment_payload() {
        let (name, data) = sse_event_payload(SseEvent::Fragment {
            agent: AgentLabel::Agent2,
            text: "Hel".to_string(),
        });
        assert_eq!(name, "fragment");
        assert_eq!(data["agent"], "agent2");
        assert_eq!(data["text"], "Hel");
    }

    #[test]
    fn test_message_payload_uses_display_mapping() {
        let message = Message::new(AgentLabel::Agent1, "A", "hi", Local::now());
        let (name, data) = sse_event_payload(SseEvent::Message { message });
        assert_eq!(name, "message");
        assert_eq!(data["message"]["role"], "user");
        assert_eq!(data["message"]["avatar"], "🤖");
    }

    #[test]
    fn test_state_change_payload() {
        let (name, data) = sse_event_payload(SseEvent::StateChange {
            status: ConvStatus::PausedByTimeLimit,
            reason: Some("Time limit reached".to_string()),
        });
        assert_eq!(name, "state_change");
        assert_eq!(data["status"], ConvStatus::PausedByTimeLimit.as_str());
        assert_eq!(data["reason"], "Time limit reached");
    }
}

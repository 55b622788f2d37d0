//! Live console over WebSocket.
//!
//! One connection = one console sink registered under the authenticated
//! owner. The sink serializes each console event to the wire shape
//! `{"type": "output"|"error"|"closed", "bot": …, "payload": …}` and pushes
//! it into the connection's outbound queue; the socket task forwards queue
//! items and tears the sink down when the peer goes away.
//!
//! Browsers cannot set headers on a WebSocket handshake, so the token
//! arrives as `?token=…`; an `Authorization` header works too.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::server::api::{owner_of, AppState};
use crate::{BotEvent, EventKind, ExitReason, Subscribe};

#[derive(Deserialize)]
pub(crate) struct ConsoleQuery {
    token: Option<String>,
}

/// `GET /api/console` — upgrades to the live console stream.
pub(crate) async fn console(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConsoleQuery>,
) -> Response {
    let owner = match query.token.as_deref().and_then(|t| state.auth.verify(t)) {
        Some(owner) => owner,
        None => match owner_of(&state, &headers) {
            Ok(owner) => owner,
            Err(err) => return err.into_response(),
        },
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, owner))
}

/// Translates console events into outbound text frames.
struct WsSink {
    outbound: mpsc::UnboundedSender<Message>,
}

#[async_trait::async_trait]
impl Subscribe for WsSink {
    async fn on_event(&self, event: &BotEvent) {
        let kind = match event.kind {
            EventKind::Output => "output",
            EventKind::ErrorOutput => "error",
            EventKind::Closed => "closed",
            _ => return,
        };
        // Exit codes go out as JSON integers; only an abnormal termination
        // (killed by signal) is a string marker.
        let payload = match event.kind {
            EventKind::Closed => match event.exit {
                Some(ExitReason::Code(code)) => json!(code),
                Some(ExitReason::Signal(sig)) => json!(format!("signal:{sig}")),
                None => serde_json::Value::Null,
            },
            _ => event
                .chunk
                .as_deref()
                .map_or(serde_json::Value::Null, |c| json!(c)),
        };
        let frame = json!({
            "type": kind,
            "bot": event.bot.as_deref(),
            "payload": payload,
        });
        // A closed queue means the socket task already exited; the sink is
        // about to be unsubscribed.
        let _ = self.outbound.send(Message::Text(frame.to_string()));
    }

    fn name(&self) -> &'static str {
        "ws_console"
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, owner: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel();

    let sink_id = state
        .supervisor
        .subscribe(&owner, Arc::new(WsSink { outbound }));
    tracing::debug!(user = %owner, "console attached");

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(frame).await.is_err() {
                    break;
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Inbound frames are ignored; the console is read-only.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.supervisor.unsubscribe(&owner, sink_id);
    tracing::debug!(user = %owner, "console detached");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sink() -> (WsSink, mpsc::UnboundedReceiver<Message>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (WsSink { outbound }, rx)
    }

    fn frame(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
        let Message::Text(text) = rx.try_recv().expect("no frame emitted") else {
            panic!("console frames are text");
        };
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn closed_frame_carries_integer_exit_code() {
        let (sink, mut rx) = sink();
        sink.on_event(
            &BotEvent::now(EventKind::Closed)
                .with_owner("alice")
                .with_bot("/bots/alice/ping.sh")
                .with_exit(ExitReason::Code(0)),
        )
        .await;

        let frame = frame(&mut rx);
        assert_eq!(frame["type"], "closed");
        assert_eq!(frame["bot"], "/bots/alice/ping.sh");
        assert_eq!(frame["payload"], Value::from(0));
    }

    #[tokio::test]
    async fn closed_frame_marks_signal_termination_as_string() {
        let (sink, mut rx) = sink();
        sink.on_event(
            &BotEvent::now(EventKind::Closed)
                .with_bot("/bots/alice/long.sh")
                .with_exit(ExitReason::Signal(9)),
        )
        .await;

        assert_eq!(frame(&mut rx)["payload"], "signal:9");
    }

    #[tokio::test]
    async fn output_frames_carry_the_chunk() {
        let (sink, mut rx) = sink();
        sink.on_event(
            &BotEvent::now(EventKind::Output)
                .with_bot("/bots/alice/ping.sh")
                .with_chunk("hello\n"),
        )
        .await;
        sink.on_event(
            &BotEvent::now(EventKind::ErrorOutput)
                .with_bot("/bots/alice/ping.sh")
                .with_chunk("oops\n"),
        )
        .await;

        let out = frame(&mut rx);
        assert_eq!(out["type"], "output");
        assert_eq!(out["payload"], "hello\n");
        let err = frame(&mut rx);
        assert_eq!(err["type"], "error");
        assert_eq!(err["payload"], "oops\n");
    }

    #[tokio::test]
    async fn non_console_events_emit_nothing() {
        let (sink, mut rx) = sink();
        sink.on_event(&BotEvent::now(EventKind::Started).with_bot("/b.sh"))
            .await;
        sink.on_event(&BotEvent::now(EventKind::ShutdownRequested)).await;
        assert!(rx.try_recv().is_err());
    }
}

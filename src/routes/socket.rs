//! WebSocket session endpoint
//!
//! Each connection is one session. Inbound text frames are parsed as
//! [`ClientEvent`]s and handed to the hub; everything the hub queues for the
//! session is written back as JSON text frames.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;
use crate::sync::{ClientEvent, FrameError, ServerEvent, SessionHandle, SyncHub};

/// How long queued events may take to flush after the client stops sending
const FLUSH_TIMEOUT_SECS: u64 = 5;

/// Upgrade the request to a session socket
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.hub().clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: SyncHub) {
    let SessionHandle { id, events } = hub.connect().await;
    let (sink, mut stream) = socket.split();

    let writer = tokio::spawn(forward_events(id, events, sink));

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientEvent::parse(&text) {
                Ok(event) => {
                    tracing::debug!(session_id = %id, event = event.name(), "Received event");
                    hub.handle_event(id, event).await;
                }
                Err(FrameError::MalformedPush(e)) => {
                    tracing::debug!(session_id = %id, "Malformed push frame: {}", e);
                    hub.reject_push(id).await;
                }
                Err(e @ FrameError::Malformed(_)) => {
                    tracing::warn!(session_id = %id, "Ignoring frame: {}", e);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session_id = %id, "Socket error: {}", e);
                break;
            }
        }
    }

    // Disconnecting drops the hub's sender, so the writer stops once the
    // queue is empty.
    hub.disconnect(id).await;

    let abort = writer.abort_handle();
    if tokio::time::timeout(Duration::from_secs(FLUSH_TIMEOUT_SECS), writer)
        .await
        .is_err()
    {
        tracing::debug!(session_id = %id, "Timed out flushing queued events");
        abort.abort();
    }
}

/// Write every queued event to `sink` until the session's queue closes
///
/// Returns the number of frames written. Stops early if the sink fails.
pub async fn forward_events<S>(
    id: Uuid,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
    mut sink: S,
) -> usize
where
    S: Sink<Message> + Unpin,
{
    let mut written = 0;

    while let Some(event) = events.recv().await {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(session_id = %id, "Failed to encode event: {}", e);
                continue;
            }
        };
        if sink.send(Message::Text(text)).await.is_err() {
            tracing::debug!(session_id = %id, "Socket closed while writing");
            break;
        }
        written += 1;
    }

    written
}

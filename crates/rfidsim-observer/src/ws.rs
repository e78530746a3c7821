//! `WebSocket` handler for the live tag stream.
//!
//! Clients connect to `GET /ws/tags` and receive every reader payload the
//! running simulation emits, as a JSON text frame. Each connection
//! registers itself with the [`SubscriberRegistry`] for its lifetime and
//! unsubscribes when the socket closes or a send fails.
//!
//! The client is not expected to send anything. Inbound text and binary
//! frames are ignored; pings are answered.
//!
//! [`SubscriberRegistry`]: rfidsim_core::registry::SubscriberRegistry

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use rfidsim_types::SubscriberId;
use tracing::debug;

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming reader payloads.
///
/// # Route
///
/// `GET /ws/tags`
pub async fn ws_tags(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Handle the `WebSocket` lifecycle: register with the registry, forward
/// each payload as a text frame, and unsubscribe on exit.
async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let (id, mut payloads) = state.registry.connect();
    debug!(subscriber = %id, "WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // Next payload from the simulation loop.
            payload = payloads.recv() => {
                let Some(payload) = payload else {
                    debug!(subscriber = %id, "Subscriber channel closed");
                    break;
                };
                let frame = Message::Text(payload.to_string().into());
                if sender.send(frame).await.is_err() {
                    debug!(subscriber = %id, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            // Close frames, pings, and transport errors from the client.
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(subscriber = %id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!(subscriber = %id, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(subscriber = %id, error = %e, "WebSocket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    disconnect(&state, id);
}

fn disconnect(state: &AppState, id: SubscriberId) {
    state.registry.unsubscribe(id);
    debug!(subscriber = %id, remaining = state.registry.len(), "WebSocket subscriber removed");
}

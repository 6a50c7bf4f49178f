//! WebSocket fan-out of dashboard events.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use aether_core::DashboardEvent;

use crate::state::AppState;

/// Upgrade to a WebSocket that receives every event as a JSON text frame.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // Subscribe before the upgrade completes so no event slips between
    // handshake and first poll.
    let events = state.bus.subscribe();
    debug!(subscribers = state.bus.subscriber_count(), "Dashboard subscribed");
    ws.on_upgrade(move |socket| forward_events(socket, events))
}

async fn forward_events(socket: WebSocket, mut events: broadcast::Receiver<DashboardEvent>) {
    let (mut sender, mut receiver) = socket.split();
    info!("Dashboard connected");

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, event = event.kind(), "Failed to serialize event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Dashboard lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => debug!("Ignoring client frame"),
            },
        }
    }

    info!("Dashboard disconnected");
}

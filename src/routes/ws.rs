//! WebSocket handler: per-client event relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client events → decode + dispatch by event name
//! - Snapshots forwarded from channel peers → write to the socket
//!
//! Dispatch returns the events owed to the sender (a `canvas-init` after a
//! join, or an `error`). Fan-out to peers happens inside the channel service.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → wait for `join-project`
//! 2. `join-project` → join new channel, part old one, reply `canvas-init`
//! 3. `canvas-update` → replace channel snapshot, forward to peers
//! 4. Close → part channel

#[cfg(test)]
#[path = "ws_test.rs"]
mod ws_test;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use frames::{Event, decode_event, encode_event};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ErrorCode, error_event};
use crate::services::channel::{self, ChannelError};
use crate::state::AppState;

const CLIENT_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Per-connection state the dispatcher mutates.
pub(crate) struct Connection {
    pub client_id: Uuid,
    /// Channel this client is joined to.
    pub project_id: Option<String>,
    /// Handed to the channel on join so peers can reach this client.
    pub tx: mpsc::Sender<Event>,
}

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::channel::<Event>(CLIENT_QUEUE_CAPACITY);
    let mut conn = Connection { client_id: Uuid::new_v4(), project_id: None, tx };
    info!(client_id = %conn.client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, &mut conn, text.as_str()).await;
                        if send_events(&mut socket, &replies).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = rx.recv() => {
                if send_events(&mut socket, std::slice::from_ref(&event)).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(project_id) = conn.project_id.take() {
        channel::part_channel(&state, &project_id, conn.client_id).await;
    }
    info!(client_id = %conn.client_id, "ws: client disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Decode and handle one inbound text frame; returns the events for the
/// sender.
pub(crate) async fn process_inbound_text(state: &AppState, conn: &mut Connection, text: &str) -> Vec<Event> {
    let event = match decode_event(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(client_id = %conn.client_id, error = %e, "ws: invalid inbound frame");
            return vec![reply_error(conn, &ChannelError::Malformed(e.to_string()))];
        }
    };

    let result = match event {
        Event::JoinProject { project_id } => handle_join(state, conn, project_id).await.map(Some),
        Event::CanvasUpdate(update) => {
            channel::publish(state, conn.project_id.as_deref(), conn.client_id, update).await.map(|_| None)
        }
        other => Err(ChannelError::Unexpected(other.name())),
    };

    match result {
        Ok(Some(reply)) => vec![reply],
        Ok(None) => Vec::new(),
        Err(e) => vec![reply_error(conn, &e)],
    }
}

async fn handle_join(state: &AppState, conn: &mut Connection, project_id: String) -> Result<Event, ChannelError> {
    // Join first so a refused join leaves the client in its old channel.
    let elements = channel::join_channel(state, &project_id, conn.client_id, conn.tx.clone()).await?;
    let previous = conn.project_id.replace(project_id.clone());
    if let Some(previous) = previous.filter(|p| *p != project_id) {
        channel::part_channel(state, &previous, conn.client_id).await;
    }
    Ok(Event::CanvasInit { elements })
}

fn reply_error(conn: &Connection, err: &ChannelError) -> Event {
    warn!(
        client_id = %conn.client_id,
        code = err.error_code(),
        retryable = err.retryable(),
        error = %err,
        "ws: rejecting inbound event"
    );
    error_event(err)
}

// =============================================================================
// OUTBOUND
// =============================================================================

async fn send_events(socket: &mut WebSocket, events: &[Event]) -> Result<(), axum::Error> {
    for event in events {
        let text = match encode_event(event) {
            Ok(text) => text,
            Err(e) => {
                warn!(event = event.name(), error = %e, "ws: failed to encode event");
                continue;
            }
        };
        debug!(event = event.name(), "ws: send event");
        socket.send(Message::Text(text.into())).await?;
    }
    Ok(())
}

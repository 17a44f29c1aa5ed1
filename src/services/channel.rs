//! Channel service: join/part, snapshot publish, and fan-out.
//!
//! DESIGN
//! ======
//! A channel is keyed by project id and lives in memory while any client is
//! joined. On the first join it is seeded from the project store when one is
//! configured; otherwise it starts empty. Every accepted `canvas-update`
//! replaces the channel snapshot wholesale and is forwarded to every other
//! member. The sender never receives its own update.
//!
//! ERROR HANDLING
//! ==============
//! A store lookup that finds no project seeds an empty channel. Any other
//! store failure refuses the join; the client stays where it was. Fan-out
//! uses `try_send`: a member whose queue is full misses that snapshot, and
//! the next one carries the whole document anyway.

#[cfg(test)]
#[path = "channel_test.rs"]
mod channel_test;

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use canvas::doc::CanvasElement;
use canvas_sync::store::StoreError;
use frames::Event;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::state::{AppState, ChannelState};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("join a project before sending updates")]
    NotJoined,
    #[error("update for {received} sent on channel {joined}")]
    ProjectMismatch { joined: String, received: String },
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("{0} is not accepted from clients")]
    Unexpected(&'static str),
    #[error("project store unavailable: {0}")]
    Store(String),
}

impl ErrorCode for ChannelError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotJoined => "E_NOT_JOINED",
            Self::ProjectMismatch { .. } => "E_PROJECT_MISMATCH",
            Self::Malformed(_) => "E_MALFORMED",
            Self::Unexpected(_) => "E_UNEXPECTED_EVENT",
            Self::Store(_) => "E_STORE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Join a channel, creating and hydrating it if this is the first member.
/// Returns the snapshot the client should be seeded with.
///
/// # Errors
///
/// Returns [`ChannelError::Store`] if hydration fails for a reason other
/// than a missing project.
pub async fn join_channel(
    state: &AppState,
    project_id: &str,
    client_id: Uuid,
    tx: mpsc::Sender<Event>,
) -> Result<Vec<CanvasElement>, ChannelError> {
    let live = state.channels.read().await.contains_key(project_id);

    // Fetch outside the lock. The channel may be evicted before the write
    // lock is taken, so a missing channel with no hydration fetches again.
    let mut hydration = if live { None } else { Some(hydrate(state, project_id).await?) };
    loop {
        let joined = {
            let mut channels = state.channels.write().await;
            attach(&mut channels, project_id, client_id, &tx, hydration.take())
        };
        if let Some(snapshot) = joined {
            return Ok(snapshot);
        }
        debug!(%project_id, "channel evicted before join; hydrating");
        hydration = Some(hydrate(state, project_id).await?);
    }
}

/// Add a client to a channel under the write lock. A missing channel is
/// created only from `hydration`; without it nothing changes and `None` is
/// returned.
fn attach(
    channels: &mut HashMap<String, ChannelState>,
    project_id: &str,
    client_id: Uuid,
    tx: &mpsc::Sender<Event>,
    hydration: Option<Vec<CanvasElement>>,
) -> Option<Vec<CanvasElement>> {
    let channel = match channels.entry(project_id.to_owned()) {
        Entry::Occupied(entry) => {
            let channel = entry.into_mut();
            if channel.clients.is_empty() {
                if let Some(snapshot) = hydration {
                    info!(%project_id, count = snapshot.len(), "hydrated channel");
                    channel.snapshot = snapshot;
                }
            }
            channel
        }
        Entry::Vacant(entry) => {
            let snapshot = hydration?;
            info!(%project_id, count = snapshot.len(), "hydrated channel");
            entry.insert(ChannelState::new(snapshot))
        }
    };
    channel.clients.insert(client_id, tx.clone());
    info!(%project_id, %client_id, clients = channel.clients.len(), "client joined channel");
    Some(channel.snapshot.clone())
}

async fn hydrate(state: &AppState, project_id: &str) -> Result<Vec<CanvasElement>, ChannelError> {
    let Some(store) = &state.store else {
        return Ok(Vec::new());
    };
    match store.get(project_id).await {
        Ok(elements) => Ok(elements),
        Err(StoreError::NotFound(_)) => {
            debug!(%project_id, "no stored project; channel starts empty");
            Ok(Vec::new())
        }
        Err(e) => {
            warn!(%project_id, error = %e, "channel hydration failed");
            Err(ChannelError::Store(e.to_string()))
        }
    }
}

/// Leave a channel. Evicts it when the last member goes.
pub async fn part_channel(state: &AppState, project_id: &str, client_id: Uuid) {
    let mut channels = state.channels.write().await;
    let Some(channel) = channels.get_mut(project_id) else {
        return;
    };
    channel.clients.remove(&client_id);
    info!(%project_id, %client_id, remaining = channel.clients.len(), "client left channel");
    if channel.clients.is_empty() {
        channels.remove(project_id);
        info!(%project_id, "evicted channel");
    }
}

// =============================================================================
// PUBLISH
// =============================================================================

/// Accept a `canvas-update` from `client_id`, who is joined to `joined`.
/// Replaces the channel snapshot and forwards the event to the other
/// members. Returns how many members it was forwarded to.
///
/// # Errors
///
/// Returns [`ChannelError::NotJoined`] or [`ChannelError::ProjectMismatch`]
/// when the update is not for the sender's channel.
pub async fn publish(
    state: &AppState,
    joined: Option<&str>,
    client_id: Uuid,
    update: frames::CanvasUpdate,
) -> Result<usize, ChannelError> {
    let Some(joined) = joined else {
        return Err(ChannelError::NotJoined);
    };
    if update.project_id != joined {
        return Err(ChannelError::ProjectMismatch { joined: joined.to_owned(), received: update.project_id });
    }

    let mut channels = state.channels.write().await;
    let Some(channel) = channels.get_mut(joined) else {
        return Err(ChannelError::NotJoined);
    };
    channel.snapshot.clone_from(&update.elements);
    let count = update.elements.len();
    let event = Event::CanvasUpdate(update);
    let forwarded = fan_out(channel, &event, client_id);
    debug!(project_id = %joined, %client_id, count, forwarded, "snapshot published");
    Ok(forwarded)
}

/// Send `event` to every member except `sender`.
fn fan_out(channel: &ChannelState, event: &Event, sender: Uuid) -> usize {
    let mut sent = 0;
    for (id, tx) in &channel.clients {
        if *id == sender {
            continue;
        }
        match tx.try_send(event.clone()) {
            Ok(()) => sent += 1,
            Err(mpsc::error::TrySendError::Full(_)) => warn!(client_id = %id, event = event.name(), "client queue full; event dropped"),
            Err(mpsc::error::TrySendError::Closed(_)) => debug!(client_id = %id, "client gone before fan-out"),
        }
    }
    sent
}

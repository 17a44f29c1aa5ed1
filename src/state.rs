//! Shared relay state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the optional project store and a map of live project channels.
//! Each channel keeps its connected clients and the last snapshot any member
//! published, so late joiners can be seeded with `canvas-init`.

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use std::collections::HashMap;
use std::sync::Arc;

use canvas::doc::CanvasElement;
use canvas_sync::store::ProjectStore;
use frames::Event;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

// =============================================================================
// CHANNEL STATE
// =============================================================================

/// Per-project live state. Exists while at least one client is joined.
pub struct ChannelState {
    /// Connected clients: client_id -> sender for outgoing events.
    pub clients: HashMap<Uuid, mpsc::Sender<Event>>,
    /// Latest full document published to the channel.
    pub snapshot: Vec<CanvasElement>,
}

impl ChannelState {
    #[must_use]
    pub fn new(snapshot: Vec<CanvasElement>) -> Self {
        Self { clients: HashMap::new(), snapshot }
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum; all inner fields
/// are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub channels: Arc<RwLock<HashMap<String, ChannelState>>>,
    /// Where channels hydrate their first snapshot from. `None` starts
    /// every channel empty.
    pub store: Option<Arc<dyn ProjectStore>>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Option<Arc<dyn ProjectStore>>) -> Self {
        Self { channels: Arc::new(RwLock::new(HashMap::new())), store }
    }
}

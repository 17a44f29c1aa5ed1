//! `SyncCore`: the pure, clock-injected heart of the sync client.
//!
//! DESIGN
//! ======
//! `SyncCore` wires the edit pipeline, debouncer, reconciler, membership,
//! and persistence tracker together. It performs no I/O. Methods take the
//! current [`Instant`] where timing matters and return [`Effect`]s for the
//! host to execute: frames to send, store calls to make, and notices to
//! show. Store results come back through the `*_completed` methods tagged
//! with the session generation they were issued under.
//!
//! Local mutations schedule a broadcast. Remote snapshots never do.
//!
//! [`SyncCore::open_project`] defers `join-project` until the store load
//! completes, so the relay's `canvas-init` always lands after the stored
//! document and wins.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use canvas::doc::{CanvasElement, Document, ElementId, ElementKind};
use canvas::transform::{Bounds, ClickTarget, GestureKind};
use frames::Event;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::debounce::Debouncer;
use crate::persist::{PersistOutcome, PersistTicket, PersistTracker};
use crate::pipeline::{EditPipeline, PropertyError};
use crate::reconciler::{Reconciled, reconcile_init, reconcile_update};
use crate::session::{Membership, Session};
use crate::transport::ConnectionStatus;

// =============================================================================
// EFFECTS
// =============================================================================

/// Work the host must perform on behalf of the core.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send an event over the transport.
    Send(Event),
    /// Write `elements` to the store under `ticket`.
    Persist { ticket: PersistTicket, elements: Vec<CanvasElement> },
    /// Fetch a project's document.
    Load { generation: u64, project_id: String },
    /// Create a new project from `elements`.
    Create { generation: u64, name: String, elements: Vec<CanvasElement> },
    /// Tell the user something.
    Notify(Notice),
}

/// User-facing notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Status(ConnectionStatus),
    Joined { project_id: String },
    Initialized { project_id: String, count: usize },
    RemoteApplied { project_id: String, count: usize },
    SnapshotRejected { reason: String },
    Loaded { project_id: String, count: usize },
    LoadFailed { project_id: String, message: String },
    Saved { project_id: String, revision: u64 },
    PersistFailed { project_id: String, message: String },
    Created { project_id: String, name: String },
    CreateFailed { name: String, message: String },
    EditRejected { message: String },
    RelayError { code: String, message: String },
}

/// Read-only copy of the client state for rendering or inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentView {
    pub project_id: Option<String>,
    pub revision: u64,
    pub elements: Vec<CanvasElement>,
    pub selected: Option<ElementId>,
    pub status: ConnectionStatus,
}

// =============================================================================
// CORE
// =============================================================================

/// Sync state machine for one client.
#[derive(Debug)]
pub struct SyncCore {
    pipeline: EditPipeline,
    membership: Membership,
    debouncer: Debouncer,
    persist: PersistTracker,
    status: ConnectionStatus,
    /// Generation whose store load is outstanding. Joining waits for it.
    loading: Option<u64>,
}

impl SyncCore {
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            pipeline: EditPipeline::new(Bounds::new(config.canvas_width, config.canvas_height)),
            membership: Membership::new(),
            debouncer: Debouncer::new(config.debounce, config.echo_guard),
            persist: PersistTracker::new(),
            status: ConnectionStatus::default(),
            loading: None,
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn document(&self) -> &Document {
        self.pipeline.document()
    }

    #[must_use]
    pub fn pipeline(&self) -> &EditPipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.membership.current()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// When [`SyncCore::tick`] next has work, if ever.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.persist.is_dirty(self.document().revision())
    }

    #[must_use]
    pub fn view(&self) -> DocumentView {
        DocumentView {
            project_id: self.session().map(|s| s.project_id().to_owned()),
            revision: self.document().revision(),
            elements: self.document().all_elements(),
            selected: self.pipeline.transform().selected_id().map(str::to_owned),
            status: self.status,
        }
    }

    fn generation(&self) -> u64 {
        self.session().map_or(0, Session::generation)
    }

    // =========================================================================
    // MEMBERSHIP
    // =========================================================================

    fn enter(&mut self, project_id: &str) -> u64 {
        self.debouncer.cancel();
        self.persist.reset();
        self.loading = None;
        let generation = self.membership.join(project_id).generation();
        info!(%project_id, generation, "joined project");
        generation
    }

    /// The `join-project` frame for the current session, if it can go out now.
    fn join_frame(&self) -> Option<Effect> {
        if self.status != ConnectionStatus::Connected || self.loading.is_some() {
            return None;
        }
        let session = self.session()?;
        Some(Effect::Send(Event::JoinProject { project_id: session.project_id().to_owned() }))
    }

    /// Join a project channel. Any pending broadcast for the previous
    /// session is dropped and persistence tracking starts over.
    pub fn join(&mut self, project_id: &str) -> Vec<Effect> {
        self.enter(project_id);
        let mut effects = vec![Effect::Notify(Notice::Joined { project_id: project_id.to_owned() })];
        effects.extend(self.join_frame());
        effects
    }

    /// Load a project from the store, then join its channel. The
    /// `join-project` frame goes out from [`SyncCore::load_completed`].
    pub fn open_project(&mut self, project_id: &str) -> Vec<Effect> {
        let generation = self.enter(project_id);
        self.loading = Some(generation);
        vec![
            Effect::Notify(Notice::Joined { project_id: project_id.to_owned() }),
            Effect::Load { generation, project_id: project_id.to_owned() },
        ]
    }

    /// Leave the current channel. No message is sent.
    pub fn leave(&mut self) -> Option<Session> {
        self.debouncer.cancel();
        self.persist.reset();
        self.loading = None;
        let left = self.membership.leave();
        if let Some(session) = &left {
            info!(project_id = %session.project_id(), "left project");
        }
        left
    }

    /// Transport connectivity changed. On `Connected`, the remembered
    /// session is re-joined unless its store load is still outstanding.
    pub fn set_status(&mut self, status: ConnectionStatus) -> Vec<Effect> {
        if self.status == status {
            return Vec::new();
        }
        self.status = status;
        let mut effects = vec![Effect::Notify(Notice::Status(status))];
        if let Some(join) = self.join_frame() {
            debug!("re-joining after connect");
            effects.push(join);
        }
        effects
    }

    // =========================================================================
    // LOCAL EDITS
    // =========================================================================

    fn local_mutation(&mut self, now: Instant) {
        let doc = self.pipeline.document();
        self.debouncer.schedule(now, self.membership.current(), doc.revision(), doc.all_elements());
    }

    fn mutated(&mut self, changed: bool, now: Instant) -> bool {
        if changed {
            self.local_mutation(now);
        }
        changed
    }

    pub fn add(&mut self, kind: ElementKind, now: Instant) -> ElementId {
        let id = self.pipeline.add(kind);
        debug!(%id, %kind, "element added");
        self.local_mutation(now);
        id
    }

    pub fn click(&mut self, id: &str) -> bool {
        self.pipeline.click(id)
    }

    pub fn double_click(&mut self, id: &str) -> bool {
        self.pipeline.double_click(id)
    }

    pub fn click_canvas(&mut self, target: ClickTarget) -> bool {
        self.pipeline.click_canvas(target)
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.pipeline.set_bounds(bounds);
    }

    pub fn begin_gesture(&mut self, kind: GestureKind) -> bool {
        self.pipeline.begin_gesture(kind)
    }

    pub fn end_gesture(&mut self) -> bool {
        self.pipeline.end_gesture()
    }

    pub fn drag_to(&mut self, left: f64, top: f64, now: Instant) -> bool {
        let changed = self.pipeline.drag_to(left, top);
        self.mutated(changed, now)
    }

    pub fn resize_to(&mut self, width: f64, height: f64, now: Instant) -> bool {
        let changed = self.pipeline.resize_to(width, height);
        self.mutated(changed, now)
    }

    pub fn scale_by(&mut self, sx: f64, sy: f64, now: Instant) -> bool {
        let changed = self.pipeline.scale_by(sx, sy);
        self.mutated(changed, now)
    }

    pub fn rotate_to(&mut self, degrees: f64, now: Instant) -> bool {
        let changed = self.pipeline.rotate_to(degrees);
        self.mutated(changed, now)
    }

    /// Edit a property of the selected element.
    ///
    /// # Errors
    ///
    /// Propagates [`PropertyError`] from the pipeline.
    pub fn set_property(&mut self, key: &str, value: Value, now: Instant) -> Result<bool, PropertyError> {
        let changed = self.pipeline.set_property(key, value)?;
        Ok(self.mutated(changed, now))
    }

    pub fn delete_selected(&mut self, now: Instant) -> Option<CanvasElement> {
        let removed = self.pipeline.delete_selected()?;
        debug!(id = %removed.id, "element deleted");
        self.local_mutation(now);
        Some(removed)
    }

    pub fn import(&mut self, elements: Vec<CanvasElement>, now: Instant) -> usize {
        let added = self.pipeline.import(elements);
        self.mutated(added > 0, now);
        added
    }

    // =========================================================================
    // TIMERS
    // =========================================================================

    /// Release the debounced broadcast if it is due.
    pub fn tick(&mut self, now: Instant) -> Vec<Effect> {
        self.debouncer
            .poll(now, self.membership.current())
            .map(|update| {
                debug!(project_id = %update.project_id, count = update.elements.len(), "broadcasting snapshot");
                Effect::Send(Event::CanvasUpdate(update))
            })
            .into_iter()
            .collect()
    }

    /// Persistence poll tick, and the manual "save now" action.
    pub fn persist_due(&mut self) -> Vec<Effect> {
        let revision = self.document().revision();
        match self.persist.due(self.membership.current(), revision) {
            Some(ticket) => vec![Effect::Persist { ticket, elements: self.document().all_elements() }],
            None => Vec::new(),
        }
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Handle an event received from the transport.
    pub fn handle_event(&mut self, event: Event, now: Instant) -> Vec<Effect> {
        match event {
            Event::CanvasInit { elements } => {
                let count = elements.len();
                let outcome = reconcile_init(self.membership.current(), &mut self.pipeline, elements);
                self.after_reconcile(outcome, count, true, now)
            }
            Event::CanvasUpdate(update) => {
                let count = update.elements.len();
                let outcome = reconcile_update(self.membership.current(), &mut self.pipeline, update);
                self.after_reconcile(outcome, count, false, now)
            }
            Event::Error { code, message } => {
                warn!(%code, %message, "relay error");
                vec![Effect::Notify(Notice::RelayError { code, message })]
            }
            Event::JoinProject { project_id } => {
                debug!(%project_id, "ignoring inbound join");
                Vec::new()
            }
        }
    }

    fn after_reconcile(&mut self, outcome: Reconciled, count: usize, init: bool, now: Instant) -> Vec<Effect> {
        let Some(project_id) = self.session().map(|s| s.project_id().to_owned()) else {
            return Vec::new();
        };
        // Either way the local document now matches what the channel holds.
        if matches!(outcome, Reconciled::Applied | Reconciled::Unchanged) {
            let elements = self.pipeline.document().all_elements();
            self.debouncer.note_remote(now, &project_id, elements);
        }
        match outcome {
            Reconciled::Applied if init => {
                let revision = self.document().revision();
                self.persist.mark_persisted(revision);
                vec![Effect::Notify(Notice::Initialized { project_id, count })]
            }
            Reconciled::Applied => vec![Effect::Notify(Notice::RemoteApplied { project_id, count })],
            Reconciled::Rejected(e) => vec![Effect::Notify(Notice::SnapshotRejected { reason: e.to_string() })],
            Reconciled::NotJoined | Reconciled::WrongProject | Reconciled::Gesturing | Reconciled::Unchanged => {
                Vec::new()
            }
        }
    }

    // =========================================================================
    // STORE
    // =========================================================================

    /// Create a new project from the current document.
    pub fn save_as(&mut self, name: &str) -> Vec<Effect> {
        vec![Effect::Create { generation: self.generation(), name: name.to_owned(), elements: self.document().all_elements() }]
    }

    pub fn load_completed(
        &mut self,
        generation: u64,
        project_id: &str,
        result: Result<Vec<CanvasElement>, String>,
    ) -> Vec<Effect> {
        if !self.membership.is_current(generation) {
            debug!(%project_id, generation, "stale load discarded");
            return Vec::new();
        }
        self.loading = None;
        let mut effects = vec![Effect::Notify(self.apply_loaded(project_id, result))];
        effects.extend(self.join_frame());
        effects
    }

    fn apply_loaded(&mut self, project_id: &str, result: Result<Vec<CanvasElement>, String>) -> Notice {
        let elements = match result {
            Ok(elements) => elements,
            Err(message) => {
                warn!(%project_id, error = %message, "project load failed");
                return Notice::LoadFailed { project_id: project_id.to_owned(), message };
            }
        };
        let count = elements.len();
        if let Err(e) = self.pipeline.replace_all(elements) {
            warn!(%project_id, error = %e, "loaded project rejected");
            return Notice::LoadFailed { project_id: project_id.to_owned(), message: e.to_string() };
        }
        let revision = self.document().revision();
        self.persist.mark_persisted(revision);
        info!(%project_id, count, revision, "project loaded");
        Notice::Loaded { project_id: project_id.to_owned(), count }
    }

    pub fn persist_completed(&mut self, ticket: &PersistTicket, result: Result<(), String>) -> Vec<Effect> {
        match self.persist.complete(ticket, self.membership.current(), result) {
            PersistOutcome::Saved { project_id, revision } => vec![Effect::Notify(Notice::Saved { project_id, revision })],
            PersistOutcome::Failed { project_id, message } => {
                vec![Effect::Notify(Notice::PersistFailed { project_id, message })]
            }
            PersistOutcome::Stale => Vec::new(),
        }
    }

    /// Report a finished create. The new project is never joined, so the
    /// outcome is reported even after the session has moved on.
    pub fn create_completed(&mut self, generation: u64, name: &str, result: Result<String, String>) -> Vec<Effect> {
        if self.generation() != generation {
            debug!(%name, generation, "create finished after session change");
        }
        match result {
            Ok(project_id) => {
                info!(%project_id, %name, "project created");
                vec![Effect::Notify(Notice::Created { project_id, name: name.to_owned() })]
            }
            Err(message) => {
                warn!(%name, error = %message, "project create failed");
                vec![Effect::Notify(Notice::CreateFailed { name: name.to_owned(), message })]
            }
        }
    }
}

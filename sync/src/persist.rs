//! Persistence sync: revision-based dirty tracking against the store.
//!
//! DESIGN
//! ======
//! The tracker remembers the document revision last known to match the
//! store (set on project load, on `canvas-init`, and on a successful save).
//! A poll tick or a manual save compares that with the live revision; if
//! they differ, one full-document persist is issued. At most one persist is
//! in flight at a time.
//!
//! ERROR HANDLING
//! ==============
//! A failed persist is reported and not retried. The next tick tries again
//! only if the document is still dirty. Completions carry the session
//! generation they were issued under; a completion from an earlier session
//! is discarded without touching the tracker.

#[cfg(test)]
#[path = "persist_test.rs"]
mod persist_test;

use tracing::{debug, info, warn};

use crate::session::Session;

/// A persist the caller should execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistTicket {
    pub generation: u64,
    pub project_id: String,
    pub revision: u64,
}

/// Result of feeding a persist completion back in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The store now holds `revision`.
    Saved { project_id: String, revision: u64 },
    /// The store rejected the write. Not retried.
    Failed { project_id: String, message: String },
    /// The completion belongs to an earlier session.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    generation: u64,
    revision: u64,
}

/// Tracks the last persisted revision and the in-flight write.
#[derive(Debug, Default)]
pub struct PersistTracker {
    persisted: Option<u64>,
    in_flight: Option<InFlight>,
}

impl PersistTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the store holds `revision` (after load or init).
    pub fn mark_persisted(&mut self, revision: u64) {
        self.persisted = Some(revision);
    }

    /// Forget everything; used when the session changes.
    pub fn reset(&mut self) {
        self.persisted = None;
        self.in_flight = None;
    }

    /// Revision last known to match the store.
    #[must_use]
    pub fn persisted_revision(&self) -> Option<u64> {
        self.persisted
    }

    /// Returns `true` if the document has diverged from the store. A
    /// document never seeded from the store is not considered dirty.
    #[must_use]
    pub fn is_dirty(&self, revision: u64) -> bool {
        self.persisted.is_some_and(|p| p != revision)
    }

    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Decide whether to persist now. Returns a ticket and marks it in
    /// flight, or `None` if there is no session, nothing to save, or a
    /// write is already running.
    pub fn due(&mut self, session: Option<&Session>, revision: u64) -> Option<PersistTicket> {
        let session = session?;
        if self.in_flight.is_some() {
            debug!(revision, "persist skipped: write in flight");
            return None;
        }
        if !self.is_dirty(revision) {
            return None;
        }
        self.in_flight = Some(InFlight { generation: session.generation(), revision });
        Some(PersistTicket { generation: session.generation(), project_id: session.project_id().to_owned(), revision })
    }

    /// Feed back the result of a persist issued with `ticket`.
    pub fn complete(
        &mut self,
        ticket: &PersistTicket,
        current: Option<&Session>,
        result: Result<(), String>,
    ) -> PersistOutcome {
        if !current.is_some_and(|s| s.generation() == ticket.generation) {
            debug!(project_id = %ticket.project_id, generation = ticket.generation, "stale persist completion discarded");
            return PersistOutcome::Stale;
        }
        if self.in_flight.as_ref().is_some_and(|f| f.generation == ticket.generation && f.revision == ticket.revision) {
            self.in_flight = None;
        }
        match result {
            Ok(()) => {
                self.persisted = Some(ticket.revision);
                info!(project_id = %ticket.project_id, revision = ticket.revision, "project persisted");
                PersistOutcome::Saved { project_id: ticket.project_id.clone(), revision: ticket.revision }
            }
            Err(message) => {
                warn!(project_id = %ticket.project_id, error = %message, "project persist failed");
                PersistOutcome::Failed { project_id: ticket.project_id.clone(), message }
            }
        }
    }
}

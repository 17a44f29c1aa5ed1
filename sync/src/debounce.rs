//! Broadcast debouncer: one outbound snapshot per quiet window.
//!
//! DESIGN
//! ======
//! Every local mutation calls [`Debouncer::schedule`] with the document
//! state right after that mutation. Scheduling again before the deadline
//! replaces the captured payload and restarts the window, so a burst of N
//! edits produces exactly one send carrying the state after the Nth.
//! Superseded payloads are dropped, never queued.
//!
//! The debouncer is clock-injected: callers pass `now` and ask for
//! [`Debouncer::deadline`] to know when to call [`Debouncer::poll`].
//!
//! ECHO GUARD
//! ==========
//! The debouncer remembers the last snapshot known to be on the channel:
//! the payload it last sent, or a remote snapshot reported through
//! [`Debouncer::note_remote`]. A due payload with the same project and the
//! same elements is dropped if that snapshot was seen within the echo-guard
//! window. Peers already hold it, so sending it would only bounce it back.

#[cfg(test)]
#[path = "debounce_test.rs"]
mod debounce_test;

use std::time::Duration;

use canvas::doc::CanvasElement;
use frames::CanvasUpdate;
use tokio::time::Instant;
use tracing::debug;

use crate::session::Session;

#[derive(Debug, Clone)]
struct Pending {
    deadline: Instant,
    project_id: String,
    generation: u64,
    revision: u64,
    elements: Vec<CanvasElement>,
}

#[derive(Debug, Clone)]
struct Seen {
    at: Instant,
    project_id: String,
    elements: Vec<CanvasElement>,
}

/// Coalesces local edits into single `canvas-update` payloads.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    echo_guard: Duration,
    pending: Option<Pending>,
    last_seen: Option<Seen>,
}

impl Debouncer {
    #[must_use]
    pub fn new(window: Duration, echo_guard: Duration) -> Self {
        Self { window, echo_guard, pending: None, last_seen: None }
    }

    /// Capture the document after a local mutation and restart the window.
    /// Without a session nothing is scheduled and `false` is returned.
    pub fn schedule(
        &mut self,
        now: Instant,
        session: Option<&Session>,
        revision: u64,
        elements: Vec<CanvasElement>,
    ) -> bool {
        let Some(session) = session else {
            debug!(revision, "broadcast skipped: no project joined");
            return false;
        };
        if self.pending.is_some() {
            debug!(revision, "pending broadcast superseded");
        }
        self.pending = Some(Pending {
            deadline: now + self.window,
            project_id: session.project_id().to_owned(),
            generation: session.generation(),
            revision,
            elements,
        });
        true
    }

    /// When the pending payload is due, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a snapshot received from the channel for `project_id`.
    pub fn note_remote(&mut self, now: Instant, project_id: &str, elements: Vec<CanvasElement>) {
        self.last_seen = Some(Seen { at: now, project_id: project_id.to_owned(), elements });
    }

    fn is_echo(&self, now: Instant, pending: &Pending) -> bool {
        self.last_seen.as_ref().is_some_and(|seen| {
            now.duration_since(seen.at) < self.echo_guard
                && seen.project_id == pending.project_id
                && seen.elements == pending.elements
        })
    }

    /// Release the pending payload if its window has elapsed.
    ///
    /// The payload is dropped instead of sent if the session it was captured
    /// under is no longer current, or if the echo guard matches it.
    pub fn poll(&mut self, now: Instant, session: Option<&Session>) -> Option<CanvasUpdate> {
        if self.pending.as_ref().is_none_or(|p| now < p.deadline) {
            return None;
        }
        let pending = self.pending.take()?;

        if !session.is_some_and(|s| s.generation() == pending.generation) {
            debug!(project_id = %pending.project_id, "pending broadcast dropped: session changed");
            return None;
        }
        if self.is_echo(now, &pending) {
            debug!(revision = pending.revision, "broadcast suppressed by echo guard");
            return None;
        }

        let update = CanvasUpdate { project_id: pending.project_id.clone(), elements: pending.elements.clone() };
        self.last_seen = Some(Seen { at: now, project_id: pending.project_id, elements: pending.elements });
        Some(update)
    }

    /// Drop any pending payload without sending it.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }
}

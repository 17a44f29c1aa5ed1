//! Remote reconciler: decides whether an inbound snapshot replaces the
//! local document.
//!
//! A `canvas-update` is applied only if all of these hold, checked in order:
//! the client is joined to the snapshot's project, no local gesture is in
//! progress, and the snapshot differs from the local content. Applying is a
//! wholesale `replace_all`; nothing is merged. Applying never schedules a
//! broadcast, which is what breaks the send/receive/send loop.
//!
//! A `canvas-init` seeds the document on join and is accepted whenever a
//! session exists.

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod reconciler_test;

use canvas::doc::{CanvasElement, SnapshotError};
use frames::CanvasUpdate;
use tracing::{debug, warn};

use crate::pipeline::EditPipeline;
use crate::session::Session;

/// What happened to an inbound snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// The local document was replaced.
    Applied,
    /// No project is joined.
    NotJoined,
    /// The snapshot belongs to another project.
    WrongProject,
    /// A local gesture holds the document.
    Gesturing,
    /// The snapshot equals the local document.
    Unchanged,
    /// The snapshot breaks a document invariant; the local document is kept.
    Rejected(SnapshotError),
}

impl Reconciled {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Apply a `canvas-update` payload.
pub fn reconcile_update(session: Option<&Session>, pipeline: &mut EditPipeline, update: CanvasUpdate) -> Reconciled {
    let Some(session) = session else {
        debug!(project_id = %update.project_id, "snapshot dropped: not joined");
        return Reconciled::NotJoined;
    };
    if !session.accepts(&update.project_id) {
        debug!(project_id = %update.project_id, joined = %session.project_id(), "snapshot dropped: wrong project");
        return Reconciled::WrongProject;
    }
    if pipeline.is_gesturing() {
        debug!(project_id = %update.project_id, "snapshot dropped: local gesture in progress");
        return Reconciled::Gesturing;
    }
    if pipeline.document().same_content(&update.elements) {
        debug!(project_id = %update.project_id, "snapshot dropped: unchanged");
        return Reconciled::Unchanged;
    }
    replace(pipeline, update.elements, session)
}

/// Apply a `canvas-init` payload.
pub fn reconcile_init(session: Option<&Session>, pipeline: &mut EditPipeline, elements: Vec<CanvasElement>) -> Reconciled {
    let Some(session) = session else {
        debug!(count = elements.len(), "init dropped: not joined");
        return Reconciled::NotJoined;
    };
    if pipeline.is_gesturing() {
        pipeline.end_gesture();
    }
    replace(pipeline, elements, session)
}

fn replace(pipeline: &mut EditPipeline, elements: Vec<CanvasElement>, session: &Session) -> Reconciled {
    let count = elements.len();
    match pipeline.replace_all(elements) {
        Ok(()) => {
            debug!(project_id = %session.project_id(), count, "snapshot applied");
            Reconciled::Applied
        }
        Err(e) => {
            warn!(project_id = %session.project_id(), error = %e, "snapshot rejected");
            Reconciled::Rejected(e)
        }
    }
}

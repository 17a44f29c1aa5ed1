use super::*;
use crate::session::Membership;

fn joined() -> Membership {
    let mut m = Membership::new();
    m.join("p1");
    m
}

#[test]
fn unseeded_document_is_never_dirty() {
    let m = joined();
    let mut t = PersistTracker::new();
    assert!(!t.is_dirty(5));
    assert!(t.due(m.current(), 5).is_none());
}

#[test]
fn clean_document_issues_nothing() {
    let m = joined();
    let mut t = PersistTracker::new();
    t.mark_persisted(3);
    assert!(t.due(m.current(), 3).is_none());
}

#[test]
fn no_session_issues_nothing() {
    let mut t = PersistTracker::new();
    t.mark_persisted(1);
    assert!(t.due(None, 2).is_none());
}

#[test]
fn dirty_document_issues_one_ticket_at_a_time() {
    let m = joined();
    let mut t = PersistTracker::new();
    t.mark_persisted(1);

    let ticket = t.due(m.current(), 4).unwrap();
    assert_eq!(ticket.project_id, "p1");
    assert_eq!(ticket.revision, 4);
    assert!(t.in_flight());
    assert!(t.due(m.current(), 5).is_none());

    let outcome = t.complete(&ticket, m.current(), Ok(()));
    assert_eq!(outcome, PersistOutcome::Saved { project_id: "p1".into(), revision: 4 });
    assert_eq!(t.persisted_revision(), Some(4));
    assert!(!t.in_flight());

    // Edits made while the write was in flight remain dirty.
    assert!(t.due(m.current(), 5).is_some());
}

#[test]
fn failure_is_reported_and_not_retried_until_next_check() {
    let m = joined();
    let mut t = PersistTracker::new();
    t.mark_persisted(1);
    let ticket = t.due(m.current(), 2).unwrap();

    let outcome = t.complete(&ticket, m.current(), Err("503".into()));
    assert!(matches!(outcome, PersistOutcome::Failed { ref message, .. } if message == "503"));
    assert_eq!(t.persisted_revision(), Some(1));
    assert!(!t.in_flight());
    assert!(t.is_dirty(2));
}

#[test]
fn completion_after_project_switch_is_stale() {
    let mut m = joined();
    let mut t = PersistTracker::new();
    t.mark_persisted(1);
    let ticket = t.due(m.current(), 2).unwrap();

    m.join("p2");
    t.reset();
    t.mark_persisted(10);

    assert_eq!(t.complete(&ticket, m.current(), Ok(())), PersistOutcome::Stale);
    assert_eq!(t.persisted_revision(), Some(10));
}

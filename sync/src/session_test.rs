use super::*;

#[test]
fn starts_without_session() {
    let membership = Membership::new();
    assert!(membership.current().is_none());
    assert!(!membership.is_current(0));
}

#[test]
fn join_sets_current_project() {
    let mut membership = Membership::new();
    let session = membership.join("p1").clone();
    assert_eq!(session.project_id(), "p1");
    assert!(session.accepts("p1"));
    assert!(!session.accepts("p2"));
    assert!(membership.is_current(session.generation()));
}

#[test]
fn switching_projects_replaces_session_and_generation() {
    let mut membership = Membership::new();
    let first = membership.join("p1").generation();
    let second = membership.join("p2").generation();
    assert!(second > first);
    assert!(!membership.is_current(first));
    assert_eq!(membership.current().map(Session::project_id), Some("p2"));
}

#[test]
fn rejoining_same_project_mints_new_generation() {
    let mut membership = Membership::new();
    let first = membership.join("p1").generation();
    let second = membership.join("p1").generation();
    assert_ne!(first, second);
}

#[test]
fn leave_clears_session() {
    let mut membership = Membership::new();
    let generation = membership.join("p1").generation();
    let left = membership.leave().unwrap();
    assert_eq!(left.project_id(), "p1");
    assert!(membership.current().is_none());
    assert!(!membership.is_current(generation));
    assert!(membership.leave().is_none());
}

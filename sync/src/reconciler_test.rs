#![allow(clippy::float_cmp)]

use super::*;
use crate::session::Membership;
use canvas::doc::ElementKind;
use canvas::transform::{Bounds, GestureKind};

fn element(id: &str, x: f64, y: f64) -> CanvasElement {
    let mut el = CanvasElement::create(ElementKind::Rectangle, 0);
    el.id = id.to_owned();
    el.x = x;
    el.y = y;
    el
}

fn pipeline_with(elements: Vec<CanvasElement>) -> EditPipeline {
    let mut p = EditPipeline::new(Bounds::new(800.0, 600.0));
    p.replace_all(elements).unwrap();
    p
}

fn update(project: &str, elements: Vec<CanvasElement>) -> CanvasUpdate {
    CanvasUpdate { project_id: project.to_owned(), elements }
}

fn joined(project: &str) -> Membership {
    let mut m = Membership::new();
    m.join(project);
    m
}

#[test]
fn applies_snapshot_for_joined_project() {
    let m = joined("p1");
    let mut p = pipeline_with(vec![element("a", 50.0, 50.0)]);
    let outcome = reconcile_update(m.current(), &mut p, update("p1", vec![element("a", 60.0, 55.0)]));
    assert!(outcome.is_applied());
    assert_eq!(p.document().find("a").unwrap().x, 60.0);
}

#[test]
fn ignores_other_project() {
    let m = joined("p1");
    let mut p = pipeline_with(vec![element("a", 50.0, 50.0)]);
    let outcome = reconcile_update(m.current(), &mut p, update("p2", vec![]));
    assert_eq!(outcome, Reconciled::WrongProject);
    assert_eq!(p.document().len(), 1);
}

#[test]
fn ignores_when_not_joined() {
    let mut p = pipeline_with(vec![]);
    assert_eq!(reconcile_update(None, &mut p, update("p1", vec![element("a", 0.0, 0.0)])), Reconciled::NotJoined);
    assert_eq!(reconcile_init(None, &mut p, vec![element("a", 0.0, 0.0)]), Reconciled::NotJoined);
    assert!(p.document().is_empty());
}

#[test]
fn gesture_guard_blocks_then_next_snapshot_applies() {
    let m = joined("p1");
    let mut p = pipeline_with(vec![element("a", 50.0, 50.0), element("b", 200.0, 100.0)]);
    p.click("a");
    p.begin_gesture(GestureKind::Drag);
    p.drag_to(70.0, 70.0);

    let remote = vec![element("a", 50.0, 50.0), element("b", 300.0, 100.0)];
    assert_eq!(reconcile_update(m.current(), &mut p, update("p1", remote.clone())), Reconciled::Gesturing);
    assert_eq!(p.document().find("a").unwrap().x, 70.0);
    assert_eq!(p.document().find("b").unwrap().x, 200.0);

    p.end_gesture();
    assert!(reconcile_update(m.current(), &mut p, update("p1", remote)).is_applied());
    assert_eq!(p.document().find("b").unwrap().x, 300.0);
}

#[test]
fn same_snapshot_twice_is_noop_second_time() {
    let m = joined("p1");
    let mut p = pipeline_with(vec![element("a", 50.0, 50.0)]);
    let remote = vec![element("a", 10.0, 10.0)];

    assert!(reconcile_update(m.current(), &mut p, update("p1", remote.clone())).is_applied());
    let rev = p.document().revision();
    assert_eq!(reconcile_update(m.current(), &mut p, update("p1", remote)), Reconciled::Unchanged);
    assert_eq!(p.document().revision(), rev);
}

#[test]
fn invalid_snapshot_keeps_prior_document() {
    let m = joined("p1");
    let mut p = pipeline_with(vec![element("a", 50.0, 50.0)]);
    let outcome = reconcile_update(m.current(), &mut p, update("p1", vec![element("x", 0.0, 0.0), element("x", 1.0, 1.0)]));
    assert!(matches!(outcome, Reconciled::Rejected(SnapshotError::DuplicateId(_))));
    assert!(p.document().find("a").is_some());
}

#[test]
fn init_seeds_even_when_content_matches() {
    let m = joined("p1");
    let mut p = pipeline_with(vec![element("a", 50.0, 50.0)]);
    let rev = p.document().revision();
    assert!(reconcile_init(m.current(), &mut p, vec![element("a", 50.0, 50.0)]).is_applied());
    assert!(p.document().revision() > rev);
}

#[test]
fn init_ends_a_running_gesture() {
    let m = joined("p1");
    let mut p = pipeline_with(vec![element("a", 50.0, 50.0)]);
    p.click("a");
    p.begin_gesture(GestureKind::Drag);
    assert!(reconcile_init(m.current(), &mut p, vec![element("b", 0.0, 0.0)]).is_applied());
    assert!(!p.is_gesturing());
    assert!(p.transform().selected_id().is_none());
}

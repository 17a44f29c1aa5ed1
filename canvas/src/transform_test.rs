#![allow(clippy::float_cmp)]

use super::*;
use crate::doc::{ElementKind, Styles};

fn element(id: &str, x: f64, y: f64, w: f64, h: f64) -> CanvasElement {
    CanvasElement {
        id: id.to_owned(),
        kind: ElementKind::Button,
        x,
        y,
        width: w,
        height: h,
        rotation: 0.0,
        z_index: 1,
        content: String::new(),
        styles: Styles::new(),
    }
}

fn engine() -> TransformEngine {
    TransformEngine::new(Bounds::new(800.0, 600.0))
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// =============================================================
// Selection transitions
// =============================================================

#[test]
fn starts_idle() {
    let eng = engine();
    assert_eq!(eng.selection(), &Selection::Idle);
    assert!(eng.selected_id().is_none());
    assert!(!eng.is_gesturing());
}

#[test]
fn click_selects_in_move_mode() {
    let mut eng = engine();
    assert!(eng.click_element("a"));
    assert_eq!(eng.selected_id(), Some("a"));
    assert_eq!(eng.mode(), Some(Mode::Move));
}

#[test]
fn double_click_enters_transform_mode() {
    let mut eng = engine();
    eng.click_element("a");
    assert!(eng.double_click_element("a"));
    assert_eq!(eng.mode(), Some(Mode::Transform));
}

#[test]
fn click_after_double_click_returns_to_move_mode() {
    let mut eng = engine();
    eng.double_click_element("a");
    eng.click_element("a");
    assert_eq!(eng.mode(), Some(Mode::Move));
}

#[test]
fn container_click_deselects() {
    let mut eng = engine();
    eng.double_click_element("a");
    assert!(eng.click_canvas(ClickTarget::Container));
    assert_eq!(eng.selection(), &Selection::Idle);
}

#[test]
fn child_click_does_not_deselect() {
    let mut eng = engine();
    eng.click_element("a");
    assert!(!eng.click_canvas(ClickTarget::Child));
    assert_eq!(eng.selected_id(), Some("a"));
}

#[test]
fn container_click_when_idle_reports_no_change() {
    let mut eng = engine();
    assert!(!eng.click_canvas(ClickTarget::Container));
}

#[test]
fn no_transition_while_gesturing() {
    let mut eng = engine();
    let a = element("a", 10.0, 10.0, 50.0, 50.0);
    eng.click_element("a");
    assert!(eng.begin_gesture(GestureKind::Drag, &a));

    assert!(!eng.click_element("b"));
    assert!(!eng.double_click_element("a"));
    assert!(!eng.click_canvas(ClickTarget::Container));
    assert_eq!(eng.selected_id(), Some("a"));
    assert_eq!(eng.mode(), Some(Mode::Move));
}

#[test]
fn clear_drops_selection_and_gesture() {
    let mut eng = engine();
    let a = element("a", 10.0, 10.0, 50.0, 50.0);
    eng.click_element("a");
    eng.begin_gesture(GestureKind::Drag, &a);
    eng.clear();
    assert!(!eng.is_gesturing());
    assert!(eng.selected_id().is_none());
}

// =============================================================
// Gesture gating
// =============================================================

#[test]
fn gesture_requires_selected_element() {
    let mut eng = engine();
    let a = element("a", 0.0, 0.0, 10.0, 10.0);
    assert!(!eng.begin_gesture(GestureKind::Drag, &a));

    eng.click_element("b");
    assert!(!eng.begin_gesture(GestureKind::Drag, &a));
}

#[test]
fn move_mode_refuses_transform_gestures() {
    let mut eng = engine();
    let a = element("a", 0.0, 0.0, 10.0, 10.0);
    eng.click_element("a");
    assert!(!eng.begin_gesture(GestureKind::Resize, &a));
    assert!(!eng.begin_gesture(GestureKind::Scale, &a));
    assert!(!eng.begin_gesture(GestureKind::Rotate, &a));
    assert!(!eng.is_gesturing());
}

#[test]
fn transform_mode_allows_all_gestures() {
    for kind in [GestureKind::Drag, GestureKind::Resize, GestureKind::Scale, GestureKind::Rotate] {
        let mut eng = engine();
        let a = element("a", 0.0, 0.0, 10.0, 10.0);
        eng.double_click_element("a");
        assert!(eng.begin_gesture(kind, &a), "{kind:?} should start");
        assert!(eng.is_gesturing());
        assert!(eng.end_gesture());
        assert!(!eng.is_gesturing());
    }
}

#[test]
fn second_begin_is_refused() {
    let mut eng = engine();
    let a = element("a", 0.0, 0.0, 10.0, 10.0);
    eng.double_click_element("a");
    assert!(eng.begin_gesture(GestureKind::Drag, &a));
    assert!(!eng.begin_gesture(GestureKind::Rotate, &a));
}

#[test]
fn end_without_gesture_is_false() {
    let mut eng = engine();
    assert!(!eng.end_gesture());
}

// =============================================================
// Drag
// =============================================================

#[test]
fn drag_emits_position_patch() {
    let mut eng = engine();
    let a = element("a", 50.0, 50.0, 100.0, 40.0);
    eng.click_element("a");
    eng.begin_gesture(GestureKind::Drag, &a);

    let (id, patch) = eng.drag_to(&a, 60.0, 55.0).unwrap();
    assert_eq!(id, "a");
    assert_eq!(patch, ElementPatch::position(60.0, 55.0));
}

#[test]
fn drag_below_threshold_is_filtered() {
    let mut eng = engine();
    let a = element("a", 50.0, 50.0, 100.0, 40.0);
    eng.click_element("a");
    eng.begin_gesture(GestureKind::Drag, &a);

    assert!(eng.drag_to(&a, 50.4, 50.6).is_none());
    assert!(eng.drag_to(&a, 51.0, 50.0).is_some());
}

#[test]
fn drag_clamps_to_container() {
    let mut eng = engine();
    let a = element("a", 50.0, 50.0, 100.0, 40.0);
    eng.click_element("a");
    eng.begin_gesture(GestureKind::Drag, &a);

    let (_, patch) = eng.drag_to(&a, -30.0, 900.0).unwrap();
    assert_eq!(patch.x, Some(0.0));
    assert_eq!(patch.y, Some(560.0));

    let (_, patch) = eng.drag_to(&a, 790.0, -5.0).unwrap();
    assert_eq!(patch.x, Some(700.0));
    assert_eq!(patch.y, Some(0.0));
}

#[test]
fn drag_without_gesture_is_none() {
    let mut eng = engine();
    let a = element("a", 0.0, 0.0, 10.0, 10.0);
    eng.click_element("a");
    assert!(eng.drag_to(&a, 100.0, 100.0).is_none());
}

#[test]
fn drag_of_other_element_is_none() {
    let mut eng = engine();
    let a = element("a", 0.0, 0.0, 10.0, 10.0);
    let b = element("b", 0.0, 0.0, 10.0, 10.0);
    eng.click_element("a");
    eng.begin_gesture(GestureKind::Drag, &a);
    assert!(eng.drag_to(&b, 100.0, 100.0).is_none());
}

#[test]
fn rotated_element_clamps_by_rotated_box() {
    let bounds = Bounds::new(800.0, 600.0);
    let mut el = element("a", 0.0, 0.0, 100.0, 20.0);
    el.rotation = 90.0;
    // Rotated 90°, the visual box is 20 wide and 100 tall around the center.
    let (x, y) = bounds.clamp_position(&el, -100.0, -100.0);
    assert!(approx(x + 50.0, 10.0));
    assert!(approx(y + 10.0, 50.0));
}

#[test]
fn oversized_element_pins_to_origin() {
    let bounds = Bounds::new(100.0, 100.0);
    let el = element("a", 0.0, 0.0, 300.0, 300.0);
    let (x, y) = bounds.clamp_position(&el, 40.0, 40.0);
    assert_eq!((x, y), (0.0, 0.0));
}

#[test]
fn rotated_half_extents_at_45_degrees() {
    let (hw, hh) = rotated_half_extents(10.0, 10.0, 45.0);
    let expected = 10.0 * std::f64::consts::FRAC_1_SQRT_2;
    assert!(approx(hw, expected));
    assert!(approx(hh, expected));
}

// =============================================================
// Resize / scale / rotate
// =============================================================

#[test]
fn resize_emits_size_without_aspect_lock() {
    let mut eng = engine();
    let a = element("a", 0.0, 0.0, 100.0, 50.0);
    eng.double_click_element("a");
    eng.begin_gesture(GestureKind::Resize, &a);

    let (_, patch) = eng.resize_to(300.0, 20.0).unwrap();
    assert_eq!(patch, ElementPatch::size(300.0, 20.0));
}

#[test]
fn resize_never_below_minimum() {
    let mut eng = engine();
    let a = element("a", 0.0, 0.0, 100.0, 50.0);
    eng.double_click_element("a");
    eng.begin_gesture(GestureKind::Resize, &a);

    let (_, patch) = eng.resize_to(-10.0, 0.2).unwrap();
    assert_eq!(patch, ElementPatch::size(1.0, 1.0));
}

#[test]
fn resize_below_threshold_is_filtered() {
    let mut eng = engine();
    let a = element("a", 0.0, 0.0, 100.0, 50.0);
    eng.double_click_element("a");
    eng.begin_gesture(GestureKind::Resize, &a);
    assert!(eng.resize_to(100.5, 50.5).is_none());
}

#[test]
fn scale_is_relative_to_gesture_start() {
    let mut eng = engine();
    let a = element("a", 0.0, 0.0, 100.0, 50.0);
    eng.double_click_element("a");
    eng.begin_gesture(GestureKind::Scale, &a);

    let (_, patch) = eng.scale_by(2.0, 0.5).unwrap();
    assert_eq!(patch, ElementPatch::size(200.0, 25.0));

    let (_, patch) = eng.scale_by(1.5, 1.0).unwrap();
    assert_eq!(patch, ElementPatch::size(150.0, 50.0));
}

#[test]
fn scale_below_threshold_is_filtered() {
    let mut eng = engine();
    let a = element("a", 0.0, 0.0, 100.0, 50.0);
    eng.double_click_element("a");
    eng.begin_gesture(GestureKind::Scale, &a);
    assert!(eng.scale_by(1.005, 0.995).is_none());
}

#[test]
fn rotate_has_no_snapping() {
    let mut eng = engine();
    let a = element("a", 0.0, 0.0, 100.0, 50.0);
    eng.double_click_element("a");
    eng.begin_gesture(GestureKind::Rotate, &a);

    let (_, patch) = eng.rotate_to(37.3).unwrap();
    assert_eq!(patch, ElementPatch::rotation(37.3));
    assert!(eng.rotate_to(37.9).is_none());
    assert!(eng.rotate_to(400.0).is_some());
}

#[test]
fn gesture_updates_of_wrong_kind_are_ignored() {
    let mut eng = engine();
    let a = element("a", 0.0, 0.0, 100.0, 50.0);
    eng.double_click_element("a");
    eng.begin_gesture(GestureKind::Rotate, &a);
    assert!(eng.resize_to(10.0, 10.0).is_none());
    assert!(eng.scale_by(2.0, 2.0).is_none());
    assert!(eng.drag_to(&a, 10.0, 10.0).is_none());
}

#[test]
fn set_bounds_changes_clamp() {
    let mut eng = engine();
    eng.set_bounds(Bounds::new(200.0, 200.0));
    let a = element("a", 0.0, 0.0, 50.0, 50.0);
    eng.click_element("a");
    eng.begin_gesture(GestureKind::Drag, &a);
    let (_, patch) = eng.drag_to(&a, 500.0, 500.0).unwrap();
    assert_eq!(patch, ElementPatch::position(150.0, 150.0));
    assert_eq!(eng.bounds(), Bounds::new(200.0, 200.0));
}

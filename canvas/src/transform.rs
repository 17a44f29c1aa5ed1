//! Direct-manipulation model: selection modes and the gesture state machine.
//!
//! A click selects an element in **move** mode, where only dragging is
//! allowed. A double-click switches it to **transform** mode, which adds
//! resize, scale, and rotate. Clicking the bare canvas container returns to
//! idle.
//!
//! While a gesture is in progress (pointer down to pointer up) the engine
//! refuses selection changes, and [`TransformEngine::is_gesturing`] is the
//! "actively manipulating" guard the sync layer consults before accepting a
//! remote snapshot.
//!
//! Gesture updates pass through a minimum-delta filter (1px for drag and
//! resize, 0.01 for scale, 1 degree for rotate) and come out as
//! [`ElementPatch`]es that the edit pipeline applies to the document.

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;

use crate::consts::{DRAG_STEP_PX, MIN_ELEMENT_SIZE, RESIZE_STEP_PX, ROTATE_STEP_DEG, SCALE_STEP};
use crate::doc::{CanvasElement, ElementId, ElementPatch};

/// Which manipulations a selection allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Position only.
    #[default]
    Move,
    /// Position, size, scale, and rotation.
    Transform,
}

/// Client-local selection. Never synchronized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Nothing selected.
    #[default]
    Idle,
    /// One element selected in the given mode.
    Selected { id: ElementId, mode: Mode },
}

/// What received a click on the canvas surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    /// The canvas container itself (empty background).
    Container,
    /// Some child of the container, e.g. a handle or an element's inner node.
    Child,
}

/// Kind of gesture to start on the selected element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Drag,
    Resize,
    Scale,
    Rotate,
}

impl GestureKind {
    /// Whether this gesture is allowed in `mode`.
    #[must_use]
    pub fn allowed_in(self, mode: Mode) -> bool {
        match self {
            Self::Drag => true,
            Self::Resize | Self::Scale | Self::Rotate => mode == Mode::Transform,
        }
    }
}

/// Scroll-content rectangle of the canvas container, `[0, width] × [0, height]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Clamp a proposed top-left for `el` so that its rotated bounding box
    /// stays inside these bounds. An element larger than the bounds is
    /// pinned to the top-left edge.
    #[must_use]
    pub fn clamp_position(&self, el: &CanvasElement, left: f64, top: f64) -> (f64, f64) {
        let (half_w, half_h) = rotated_half_extents(el.width, el.height, el.rotation);
        let cx = (left + el.width / 2.0).min(self.width - half_w).max(half_w);
        let cy = (top + el.height / 2.0).min(self.height - half_h).max(half_h);
        (cx - el.width / 2.0, cy - el.height / 2.0)
    }
}

/// Half extents of the axis-aligned box around a `width × height` rectangle
/// rotated by `degrees` about its center.
#[must_use]
pub fn rotated_half_extents(width: f64, height: f64, degrees: f64) -> (f64, f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (sin, cos) = (sin.abs(), cos.abs());
    ((width * cos + height * sin) / 2.0, (width * sin + height * cos) / 2.0)
}

/// The gesture currently in progress, with the last values it emitted.
#[derive(Debug, Clone, PartialEq)]
enum Gesture {
    Drag { id: ElementId, last_x: f64, last_y: f64 },
    Resize { id: ElementId, last_w: f64, last_h: f64 },
    Scale { id: ElementId, orig_w: f64, orig_h: f64, last_sx: f64, last_sy: f64 },
    Rotate { id: ElementId, last_deg: f64 },
}

/// Selection plus gesture state for one client view.
#[derive(Debug, Clone)]
pub struct TransformEngine {
    selection: Selection,
    gesture: Option<Gesture>,
    bounds: Bounds,
}

impl TransformEngine {
    #[must_use]
    pub fn new(bounds: Bounds) -> Self {
        Self { selection: Selection::Idle, gesture: None, bounds }
    }

    // --- Selection ---

    /// Single click on an element: select it in move mode.
    /// Returns `false` if a gesture is in progress.
    pub fn click_element(&mut self, id: &str) -> bool {
        self.select(id, Mode::Move)
    }

    /// Double click on an element: select it in transform mode.
    /// Returns `false` if a gesture is in progress.
    pub fn double_click_element(&mut self, id: &str) -> bool {
        self.select(id, Mode::Transform)
    }

    /// Click on the canvas surface. Only a click whose target is the
    /// container itself deselects. Returns `true` if the selection changed.
    pub fn click_canvas(&mut self, target: ClickTarget) -> bool {
        if target != ClickTarget::Container || self.is_gesturing() {
            return false;
        }
        let changed = self.selection != Selection::Idle;
        self.selection = Selection::Idle;
        changed
    }

    /// Unconditionally drop the selection and any gesture on it. Used when
    /// the selected element leaves the document.
    pub fn clear(&mut self) {
        self.selection = Selection::Idle;
        self.gesture = None;
    }

    fn select(&mut self, id: &str, mode: Mode) -> bool {
        if self.is_gesturing() {
            return false;
        }
        self.selection = Selection::Selected { id: id.to_owned(), mode };
        true
    }

    // --- Gestures ---

    /// Start a gesture on `el`, which must be the selected element and must
    /// allow `kind` in the current mode. Returns `true` if the gesture began.
    pub fn begin_gesture(&mut self, kind: GestureKind, el: &CanvasElement) -> bool {
        let Selection::Selected { id, mode } = &self.selection else {
            return false;
        };
        if *id != el.id || self.gesture.is_some() || !kind.allowed_in(*mode) {
            return false;
        }
        let id = id.clone();
        self.gesture = Some(match kind {
            GestureKind::Drag => Gesture::Drag { id, last_x: el.x, last_y: el.y },
            GestureKind::Resize => Gesture::Resize { id, last_w: el.width, last_h: el.height },
            GestureKind::Scale => Gesture::Scale { id, orig_w: el.width, orig_h: el.height, last_sx: 1.0, last_sy: 1.0 },
            GestureKind::Rotate => Gesture::Rotate { id, last_deg: el.rotation },
        });
        true
    }

    /// Finish the current gesture. Returns `true` if one was in progress.
    pub fn end_gesture(&mut self) -> bool {
        self.gesture.take().is_some()
    }

    /// Pointer moved during a drag; `left`/`top` is the proposed top-left.
    /// Returns the clamped position patch, or `None` if no drag is active or
    /// the move is below the drag threshold.
    pub fn drag_to(&mut self, el: &CanvasElement, left: f64, top: f64) -> Option<(ElementId, ElementPatch)> {
        let (x, y) = self.bounds.clamp_position(el, left, top);
        let Some(Gesture::Drag { id, last_x, last_y }) = &mut self.gesture else {
            return None;
        };
        if *id != el.id || ((x - *last_x).abs() < DRAG_STEP_PX && (y - *last_y).abs() < DRAG_STEP_PX) {
            return None;
        }
        *last_x = x;
        *last_y = y;
        Some((id.clone(), ElementPatch::position(x, y)))
    }

    /// Resize handle moved. No aspect-ratio lock.
    pub fn resize_to(&mut self, width: f64, height: f64) -> Option<(ElementId, ElementPatch)> {
        let width = width.max(MIN_ELEMENT_SIZE);
        let height = height.max(MIN_ELEMENT_SIZE);
        let Some(Gesture::Resize { id, last_w, last_h }) = &mut self.gesture else {
            return None;
        };
        if (width - *last_w).abs() < RESIZE_STEP_PX && (height - *last_h).abs() < RESIZE_STEP_PX {
            return None;
        }
        *last_w = width;
        *last_h = height;
        Some((id.clone(), ElementPatch::size(width, height)))
    }

    /// Non-uniform scale relative to the size at gesture start.
    pub fn scale_by(&mut self, sx: f64, sy: f64) -> Option<(ElementId, ElementPatch)> {
        let Some(Gesture::Scale { id, orig_w, orig_h, last_sx, last_sy }) = &mut self.gesture else {
            return None;
        };
        if (sx - *last_sx).abs() < SCALE_STEP && (sy - *last_sy).abs() < SCALE_STEP {
            return None;
        }
        *last_sx = sx;
        *last_sy = sy;
        let width = (*orig_w * sx).max(MIN_ELEMENT_SIZE);
        let height = (*orig_h * sy).max(MIN_ELEMENT_SIZE);
        Some((id.clone(), ElementPatch::size(width, height)))
    }

    /// Rotate handle moved to an absolute angle in degrees. No snapping.
    pub fn rotate_to(&mut self, degrees: f64) -> Option<(ElementId, ElementPatch)> {
        let Some(Gesture::Rotate { id, last_deg }) = &mut self.gesture else {
            return None;
        };
        if (degrees - *last_deg).abs() < ROTATE_STEP_DEG {
            return None;
        }
        *last_deg = degrees;
        Some((id.clone(), ElementPatch::rotation(degrees)))
    }

    // --- Queries ---

    /// The "actively manipulating" guard.
    #[must_use]
    pub fn is_gesturing(&self) -> bool {
        self.gesture.is_some()
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Id of the selected element, if any.
    #[must_use]
    pub fn selected_id(&self) -> Option<&str> {
        match &self.selection {
            Selection::Idle => None,
            Selection::Selected { id, .. } => Some(id),
        }
    }

    /// Mode of the current selection, if any.
    #[must_use]
    pub fn mode(&self) -> Option<Mode> {
        match &self.selection {
            Selection::Idle => None,
            Selection::Selected { mode, .. } => Some(*mode),
        }
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Track the container's current scroll-content size.
    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }
}

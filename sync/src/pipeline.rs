//! Local edit pipeline: every user-originated mutation of the document.
//!
//! Edits are applied synchronously and optimistically; there is no pending
//! state and nothing is ever rolled back. Each method that changes the
//! document reports it (a `bool`, an id, or a count) so the caller can
//! schedule a broadcast. Selection and gesture state live in the embedded
//! [`TransformEngine`] and are never synchronized.

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;

use canvas::doc::{CanvasElement, Document, ElementId, ElementKind, ElementPatch, SnapshotError, StylePatch, Styles, validate_snapshot};
use canvas::transform::{Bounds, ClickTarget, GestureKind, TransformEngine};
use serde_json::Value;
use tracing::debug;

/// Why a property edit was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropertyError {
    #[error("no element selected")]
    NoSelection,
    #[error("property {0} is not editable")]
    ReadOnly(String),
    #[error("property {key} expects {expected}")]
    InvalidValue { key: String, expected: &'static str },
}

/// The local replica plus this client's selection.
#[derive(Debug, Clone)]
pub struct EditPipeline {
    doc: Document,
    transform: TransformEngine,
}

impl EditPipeline {
    #[must_use]
    pub fn new(bounds: Bounds) -> Self {
        Self { doc: Document::new(), transform: TransformEngine::new(bounds) }
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    #[must_use]
    pub fn transform(&self) -> &TransformEngine {
        &self.transform
    }

    /// The selected element, if it is still in the document.
    #[must_use]
    pub fn selected(&self) -> Option<&CanvasElement> {
        self.transform.selected_id().and_then(|id| self.doc.find(id))
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.transform.set_bounds(bounds);
    }

    // =========================================================================
    // CREATE / DELETE
    // =========================================================================

    /// Create an element of `kind` with creation defaults and select it.
    pub fn add(&mut self, kind: ElementKind) -> ElementId {
        let element = CanvasElement::create(kind, self.doc.len());
        let id = element.id.clone();
        self.doc.add(element);
        self.transform.click_element(&id);
        id
    }

    /// Delete the selected element. Selection becomes none.
    pub fn delete_selected(&mut self) -> Option<CanvasElement> {
        let id = self.transform.selected_id()?.to_owned();
        self.transform.clear();
        self.doc.remove(&id)
    }

    /// Append externally produced elements. Elements whose id is already
    /// present, or whose geometry is not finite, are skipped. Returns the
    /// number appended.
    pub fn import(&mut self, elements: Vec<CanvasElement>) -> usize {
        let offered = elements.len();
        let mut added = 0;
        for el in elements {
            if validate_snapshot(std::slice::from_ref(&el)).is_err() {
                continue;
            }
            if self.doc.add(el) {
                added += 1;
            }
        }
        if added < offered {
            debug!(offered, added, "import skipped elements");
        }
        added
    }

    /// Replace the whole document. The selection is dropped if the selected
    /// element is not in the new content.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] and keeps the current document if the
    /// snapshot breaks a document invariant.
    pub fn replace_all(&mut self, elements: Vec<CanvasElement>) -> Result<(), SnapshotError> {
        self.doc.replace_all(elements)?;
        if self.transform.selected_id().is_some() && self.selected().is_none() {
            self.transform.clear();
        }
        Ok(())
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// Select `id` in move mode. Unknown ids are ignored.
    pub fn click(&mut self, id: &str) -> bool {
        self.doc.find(id).is_some() && self.transform.click_element(id)
    }

    /// Select `id` in transform mode. Unknown ids are ignored.
    pub fn double_click(&mut self, id: &str) -> bool {
        self.doc.find(id).is_some() && self.transform.double_click_element(id)
    }

    /// Click on the canvas surface; deselects only on the bare container.
    pub fn click_canvas(&mut self, target: ClickTarget) -> bool {
        self.transform.click_canvas(target)
    }

    // =========================================================================
    // GESTURES
    // =========================================================================

    /// Start a gesture on the selected element.
    pub fn begin_gesture(&mut self, kind: GestureKind) -> bool {
        let Some(el) = self.transform.selected_id().and_then(|id| self.doc.find(id)) else {
            return false;
        };
        self.transform.begin_gesture(kind, el)
    }

    pub fn end_gesture(&mut self) -> bool {
        self.transform.end_gesture()
    }

    #[must_use]
    pub fn is_gesturing(&self) -> bool {
        self.transform.is_gesturing()
    }

    /// Drag the selected element to a proposed top-left.
    pub fn drag_to(&mut self, left: f64, top: f64) -> bool {
        let Some(el) = self.transform.selected_id().and_then(|id| self.doc.find(id)) else {
            return false;
        };
        let update = self.transform.drag_to(el, left, top);
        self.apply(update)
    }

    pub fn resize_to(&mut self, width: f64, height: f64) -> bool {
        let update = self.transform.resize_to(width, height);
        self.apply(update)
    }

    pub fn scale_by(&mut self, sx: f64, sy: f64) -> bool {
        let update = self.transform.scale_by(sx, sy);
        self.apply(update)
    }

    pub fn rotate_to(&mut self, degrees: f64) -> bool {
        let update = self.transform.rotate_to(degrees);
        self.apply(update)
    }

    fn apply(&mut self, update: Option<(ElementId, ElementPatch)>) -> bool {
        update.is_some_and(|(id, patch)| self.doc.update(&id, &patch))
    }

    // =========================================================================
    // PROPERTY EDITS
    // =========================================================================

    /// Edit one property of the selected element.
    ///
    /// Keys naming an element field set that field. `styles` with an object
    /// value replaces the style mapping. Any other key merges into `styles`,
    /// where `null` removes the key.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError`] if nothing is selected, the key is `id` or
    /// `type`, or the value has the wrong type for a field.
    pub fn set_property(&mut self, key: &str, value: Value) -> Result<bool, PropertyError> {
        let id = self.transform.selected_id().ok_or(PropertyError::NoSelection)?.to_owned();
        let patch = property_patch(key, value)?;
        Ok(self.doc.update(&id, &patch))
    }
}

fn property_patch(key: &str, value: Value) -> Result<ElementPatch, PropertyError> {
    let invalid = |expected| PropertyError::InvalidValue { key: key.to_owned(), expected };
    let number = |value: &Value| value.as_f64().filter(|v| v.is_finite()).ok_or_else(|| invalid("a finite number"));

    let mut patch = ElementPatch::default();
    match key {
        "id" | "type" => return Err(PropertyError::ReadOnly(key.to_owned())),
        "x" => patch.x = Some(number(&value)?),
        "y" => patch.y = Some(number(&value)?),
        "width" => patch.width = Some(number(&value)?),
        "height" => patch.height = Some(number(&value)?),
        "rotation" => patch.rotation = Some(number(&value)?),
        "zIndex" => patch.z_index = Some(value.as_i64().ok_or_else(|| invalid("an integer"))?),
        "content" => match value {
            Value::String(s) => patch.content = Some(s),
            _ => return Err(invalid("a string")),
        },
        "styles" => match value {
            Value::Object(styles) => patch.styles = Some(StylePatch::Replace(styles)),
            _ => return Err(invalid("an object")),
        },
        _ => {
            let mut styles = Styles::new();
            styles.insert(key.to_owned(), value);
            patch.styles = Some(StylePatch::Merge(styles));
        }
    }
    Ok(patch)
}

//! Document model: canvas elements, sparse patches, and the revisioned store.
//!
//! This module defines what sits on the canvas (`CanvasElement`,
//! `ElementKind`), a sparse-update type for local edits (`ElementPatch`), and
//! the ordered store that owns all live elements (`Document`).
//!
//! Data flows into this layer from two directions: the local edit pipeline
//! (add/update/remove) and the remote reconciler (`replace_all`). Every
//! successful mutation bumps [`Document::revision`], which the sync layer
//! compares by value instead of diffing element lists.
//!
//! INVARIANTS
//! ==========
//! - Element ids are unique within a document at all times. `add` refuses a
//!   duplicate and `replace_all` rejects a snapshot that contains one.
//! - Updating or removing an unknown id is a no-op and leaves the revision
//!   untouched.
//! - Insertion order is the paint-order tiebreak when `z_index` values tie.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consts::{MIN_ELEMENT_SIZE, PLACEHOLDER_IMAGE_URL, SPAWN_X, SPAWN_Y};

/// Opaque, stable identifier for an element. Unique within one document.
pub type ElementId = String;

/// Free-form presentation attributes (color, border, font, ...).
pub type Styles = serde_json::Map<String, Value>;

/// The closed set of element types. Immutable once an element exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Dashed container used to group a screen's worth of elements.
    Frame,
    /// Filled rectangle. Older documents call it `square`.
    #[serde(alias = "square")]
    Rectangle,
    /// Filled ellipse inscribed in the bounding box.
    Circle,
    /// Push button with a text label.
    Button,
    /// Static text paragraph.
    Text,
    /// Text input; `content` is the placeholder.
    Input,
    /// Image; `content` is the source URL.
    Image,
    /// Horizontal rule drawn along the top of the bounding box.
    Line,
}

impl ElementKind {
    /// Every kind, in toolbar order.
    pub const ALL: [Self; 8] = [
        Self::Frame,
        Self::Rectangle,
        Self::Circle,
        Self::Button,
        Self::Text,
        Self::Input,
        Self::Image,
        Self::Line,
    ];

    /// Wire name of the kind, as used in ids and serialized documents.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Button => "button",
            Self::Text => "text",
            Self::Input => "input",
            Self::Image => "image",
            Self::Line => "line",
        }
    }

    /// Default `(width, height)` for a freshly added element.
    #[must_use]
    pub fn default_size(self) -> (f64, f64) {
        match self {
            Self::Text => (120.0, 40.0),
            _ => (150.0, 50.0),
        }
    }

    /// Default content for a freshly added element. `ordinal` is the
    /// 1-based position the element takes in the document.
    #[must_use]
    pub fn default_content(self, ordinal: usize) -> String {
        match self {
            Self::Image => PLACEHOLDER_IMAGE_URL.to_owned(),
            Self::Frame => format!("Frame {ordinal}"),
            _ => self.as_str().to_uppercase(),
        }
    }

    /// Default style mapping for a freshly added element.
    #[must_use]
    pub fn default_styles(self) -> Styles {
        let mut styles = Styles::new();
        match self {
            Self::Button => {
                styles.insert("backgroundColor".into(), Value::from("#007bff"));
                styles.insert("color".into(), Value::from("#fff"));
            }
            Self::Rectangle => {
                styles.insert("backgroundColor".into(), Value::from("#3a86ff"));
                styles.insert("color".into(), Value::from("#fff"));
            }
            _ => {}
        }
        styles.insert("fontSize".into(), Value::from(14));
        let border = if self == Self::Frame { "1px dashed #aaa" } else { "1px solid #000" };
        styles.insert("border".into(), Value::from(border));
        styles
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One placed element, as stored in the document and sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasElement {
    /// Stable identifier, assigned at creation and never reused.
    pub id: ElementId,
    /// Element type.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// Left edge in canvas-local pixels. May be negative.
    pub x: f64,
    /// Top edge in canvas-local pixels (y grows downward). May be negative.
    pub y: f64,
    /// Width in pixels, never below [`MIN_ELEMENT_SIZE`] once edited locally.
    pub width: f64,
    /// Height in pixels, never below [`MIN_ELEMENT_SIZE`] once edited locally.
    pub height: f64,
    /// Clockwise rotation in degrees. Unclamped; renderers take it modulo 360.
    #[serde(default)]
    pub rotation: f64,
    /// Stacking order, assigned once at creation.
    pub z_index: i64,
    /// Label text, image URL, or placeholder, depending on `kind`.
    #[serde(default)]
    pub content: String,
    /// Presentation attributes. Missing keys fall back to render defaults.
    #[serde(default)]
    pub styles: Styles,
}

impl CanvasElement {
    /// Build a new element of `kind` with creation defaults, placed as the
    /// next element of a document that currently holds `element_count`
    /// elements.
    #[must_use]
    pub fn create(kind: ElementKind, element_count: usize) -> Self {
        let ordinal = element_count + 1;
        let (width, height) = kind.default_size();
        Self {
            id: format!("{kind}-{}", uuid::Uuid::new_v4().simple()),
            kind,
            x: SPAWN_X,
            y: SPAWN_Y,
            width,
            height,
            rotation: 0.0,
            z_index: i64::try_from(ordinal).unwrap_or(i64::MAX),
            content: kind.default_content(ordinal),
            styles: kind.default_styles(),
        }
    }
}

/// How a patch treats the style mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum StylePatch {
    /// Insert the given keys into the existing mapping. `null` removes a key.
    Merge(Styles),
    /// Discard the existing mapping and use this one.
    Replace(Styles),
}

/// Sparse update for an element. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    pub z_index: Option<i64>,
    pub content: Option<String>,
    pub styles: Option<StylePatch>,
}

impl ElementPatch {
    /// Patch that moves an element's top-left corner.
    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    /// Patch that sets an element's size.
    #[must_use]
    pub fn size(width: f64, height: f64) -> Self {
        Self { width: Some(width), height: Some(height), ..Self::default() }
    }

    /// Patch that sets an element's rotation.
    #[must_use]
    pub fn rotation(degrees: f64) -> Self {
        Self { rotation: Some(degrees), ..Self::default() }
    }

    /// Returns `true` if the patch carries no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Why a full snapshot was refused by [`Document::replace_all`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SnapshotError {
    /// Two elements in the snapshot share an id.
    #[error("duplicate element id: {0}")]
    DuplicateId(ElementId),
    /// A geometry field is NaN or infinite.
    #[error("element {id} has non-finite {field}")]
    NonFinite { id: ElementId, field: &'static str },
}

/// Check a snapshot for the invariants a document must hold.
///
/// # Errors
///
/// Returns the first violation found, in element order.
pub fn validate_snapshot(elements: &[CanvasElement]) -> Result<(), SnapshotError> {
    let mut seen = std::collections::HashSet::with_capacity(elements.len());
    for el in elements {
        if !seen.insert(el.id.as_str()) {
            return Err(SnapshotError::DuplicateId(el.id.clone()));
        }
        let fields = [("x", el.x), ("y", el.y), ("width", el.width), ("height", el.height), ("rotation", el.rotation)];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(SnapshotError::NonFinite { id: el.id.clone(), field });
            }
        }
    }
    Ok(())
}

/// Ordered, revisioned collection of canvas elements.
#[derive(Debug, Clone, Default)]
pub struct Document {
    elements: Vec<CanvasElement>,
    revision: u64,
}

impl Document {
    /// Create an empty document at revision 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element. Returns `false` (and changes nothing) if an
    /// element with the same id already exists.
    pub fn add(&mut self, element: CanvasElement) -> bool {
        if self.find(&element.id).is_some() {
            return false;
        }
        self.elements.push(element);
        self.bump();
        true
    }

    /// Apply a sparse patch to an existing element. Returns `false` if no
    /// element has this id; the document is then left untouched.
    pub fn update(&mut self, id: &str, patch: &ElementPatch) -> bool {
        let Some(el) = self.elements.iter_mut().find(|el| el.id == id) else {
            return false;
        };
        if let Some(x) = patch.x {
            el.x = x;
        }
        if let Some(y) = patch.y {
            el.y = y;
        }
        if let Some(w) = patch.width {
            el.width = w.max(MIN_ELEMENT_SIZE);
        }
        if let Some(h) = patch.height {
            el.height = h.max(MIN_ELEMENT_SIZE);
        }
        if let Some(r) = patch.rotation {
            el.rotation = r;
        }
        if let Some(z) = patch.z_index {
            el.z_index = z;
        }
        if let Some(ref content) = patch.content {
            el.content.clone_from(content);
        }
        match &patch.styles {
            Some(StylePatch::Replace(styles)) => el.styles.clone_from(styles),
            Some(StylePatch::Merge(incoming)) => {
                for (k, v) in incoming {
                    if v.is_null() {
                        el.styles.remove(k);
                    } else {
                        el.styles.insert(k.clone(), v.clone());
                    }
                }
            }
            None => {}
        }
        self.bump();
        true
    }

    /// Remove an element by id, returning it if it was present.
    pub fn remove(&mut self, id: &str) -> Option<CanvasElement> {
        let idx = self.elements.iter().position(|el| el.id == id)?;
        let removed = self.elements.remove(idx);
        self.bump();
        Some(removed)
    }

    /// Discard the whole document and take `elements` as the new content.
    ///
    /// No merge and no per-element diffing. A snapshot that breaks the
    /// document invariants is refused and the current content is kept.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if `elements` fails [`validate_snapshot`].
    pub fn replace_all(&mut self, elements: Vec<CanvasElement>) -> Result<(), SnapshotError> {
        validate_snapshot(&elements)?;
        self.elements = elements;
        self.bump();
        Ok(())
    }

    /// Look up an element by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&CanvasElement> {
        self.elements.iter().find(|el| el.id == id)
    }

    /// Elements in insertion order.
    #[must_use]
    pub fn elements(&self) -> &[CanvasElement] {
        &self.elements
    }

    /// Owned copy of every element, in insertion order. This is the
    /// snapshot payload for broadcasts and persistence.
    #[must_use]
    pub fn all_elements(&self) -> Vec<CanvasElement> {
        self.elements.clone()
    }

    /// Elements in paint order: ascending `z_index`, insertion order on ties.
    #[must_use]
    pub fn paint_order(&self) -> Vec<&CanvasElement> {
        let mut ordered: Vec<&CanvasElement> = self.elements.iter().collect();
        ordered.sort_by_key(|el| el.z_index);
        ordered
    }

    /// Returns `true` if this document's content equals `elements`,
    /// element for element and in the same order.
    #[must_use]
    pub fn same_content(&self, elements: &[CanvasElement]) -> bool {
        self.elements.as_slice() == elements
    }

    /// Monotonically increasing mutation counter.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the document holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

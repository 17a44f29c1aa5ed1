//! Shared numeric constants for the canvas crate.

// ── Geometry ────────────────────────────────────────────────────

/// Smallest width or height an element may have, in pixels.
pub const MIN_ELEMENT_SIZE: f64 = 1.0;

// ── Gesture filters ─────────────────────────────────────────────

/// Minimum positional change, in pixels, before a drag emits an update.
pub const DRAG_STEP_PX: f64 = 1.0;

/// Minimum size change, in pixels, before a resize emits an update.
pub const RESIZE_STEP_PX: f64 = 1.0;

/// Minimum scale-factor change before a scale gesture emits an update.
pub const SCALE_STEP: f64 = 0.01;

/// Minimum rotation change, in degrees, before a rotate gesture emits an update.
pub const ROTATE_STEP_DEG: f64 = 1.0;

// ── Creation defaults ───────────────────────────────────────────

/// Top-left corner where newly added elements are placed.
pub const SPAWN_X: f64 = 50.0;

/// Top-left corner where newly added elements are placed.
pub const SPAWN_Y: f64 = 50.0;

/// Placeholder source for freshly added image elements.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://via.placeholder.com/150";

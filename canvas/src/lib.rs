//! Document model and direct-manipulation engine for the shared canvas.
//!
//! This crate is pure and synchronous. It owns what a canvas document *is*
//! (an ordered list of positioned elements) and how pointer gestures turn
//! into geometry changes. It knows nothing about the network: the sync
//! engine in `canvas-sync` feeds it local gestures and remote snapshots.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`doc`] | Element types, sparse patches, and the revisioned [`doc::Document`] |
//! | [`transform`] | Selection modes and the drag/resize/scale/rotate state machine |
//! | [`consts`] | Shared numeric constants (minimum size, gesture thresholds, defaults) |

pub mod consts;
pub mod doc;
pub mod transform;

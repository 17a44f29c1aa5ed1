//! Client-side synchronization engine for a shared canvas document.
//!
//! ARCHITECTURE
//! ============
//! Everything that decides *what* happens lives in pure, clock-injected
//! types so it can be tested without a network or a real timer:
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Local edits: add, gesture updates, property edits, delete, import |
//! | [`debounce`] | Coalesces local edits into one `canvas-update` per quiet window |
//! | [`reconciler`] | Filters and applies inbound snapshots |
//! | [`session`] | The one project channel a client belongs to |
//! | [`persist`] | Revision-based dirty tracking against the durable store |
//! | [`engine`] | [`engine::SyncCore`], wiring the above and emitting [`engine::Effect`]s |
//!
//! The I/O edge is thin: [`transport`] owns the reconnecting WebSocket,
//! [`store`] talks to the project REST API, and [`runtime`] runs the core
//! on a single task, executing effects and feeding completions back in.
//!
//! CONSISTENCY MODEL
//! =================
//! Whole-document last-writer-wins. Every broadcast carries the entire
//! document; an accepted inbound snapshot replaces the local document
//! wholesale. Concurrent edits to different elements are lost to whichever
//! snapshot arrives last. Local gestures take priority for their duration.

pub mod config;
pub mod debounce;
pub mod engine;
pub mod persist;
pub mod pipeline;
pub mod reconciler;
pub mod runtime;
pub mod session;
pub mod store;
pub mod transport;

//! Wire events shared by the sync client, the relay, and the CLI.
//!
//! Every message on the realtime transport is a JSON object
//! `{"event": <name>, "data": <payload>}`:
//!
//! | Event | Direction | Payload |
//! |-------|-----------|---------|
//! | `join-project` | client → relay | project id string |
//! | `canvas-init` | relay → client | element array |
//! | `canvas-update` | both | `{projectId, elements}` |
//! | `error` | relay → client | `{code, message}` |
//!
//! Decoding is strict about the snapshot payloads: a non-array `elements`,
//! an element that does not parse, or a snapshot that breaks the document
//! invariants is rejected as a whole. Callers keep their prior state.

use canvas::doc::{CanvasElement, SnapshotError, validate_snapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name for channel subscription.
pub const JOIN_PROJECT: &str = "join-project";
/// Event name for the one-time seed sent on join.
pub const CANVAS_INIT: &str = "canvas-init";
/// Event name for full-document snapshot broadcasts.
pub const CANVAS_UPDATE: &str = "canvas-update";
/// Event name for relay-side rejections.
pub const ERROR: &str = "error";

/// Error returned by [`encode_event`] and [`decode_event`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not a JSON frame object.
    #[error("invalid frame json: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame names an event this protocol does not define.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    /// The payload does not have the shape its event requires.
    #[error("malformed {event} payload: {reason}")]
    Malformed { event: &'static str, reason: String },
    /// The snapshot parsed but breaks a document invariant.
    #[error("invalid {event} snapshot: {source}")]
    Snapshot {
        event: &'static str,
        #[source]
        source: SnapshotError,
    },
}

/// Payload of a `canvas-update` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasUpdate {
    /// Channel the snapshot belongs to.
    pub project_id: String,
    /// The entire document, in insertion order.
    pub elements: Vec<CanvasElement>,
}

/// A decoded transport event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    JoinProject { project_id: String },
    CanvasInit { elements: Vec<CanvasElement> },
    CanvasUpdate(CanvasUpdate),
    Error { code: String, message: String },
}

impl Event {
    /// Wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinProject { .. } => JOIN_PROJECT,
            Self::CanvasInit { .. } => CANVAS_INIT,
            Self::CanvasUpdate(_) => CANVAS_UPDATE,
            Self::Error { .. } => ERROR,
        }
    }

    /// Build an `error` event.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error { code: code.into(), message: message.into() }
    }
}

#[derive(Serialize, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Encode an event into its JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the payload cannot be serialized.
pub fn encode_event(event: &Event) -> Result<String, CodecError> {
    let data = match event {
        Event::JoinProject { project_id } => Value::String(project_id.clone()),
        Event::CanvasInit { elements } => serde_json::to_value(elements)?,
        Event::CanvasUpdate(update) => serde_json::to_value(update)?,
        Event::Error { code, message } => serde_json::json!({ "code": code, "message": message }),
    };
    let raw = RawFrame { event: event.name().to_owned(), data };
    Ok(serde_json::to_string(&raw)?)
}

/// Decode a JSON text frame into an event.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for text that is not a frame object,
/// [`CodecError::UnknownEvent`] for unknown names,
/// [`CodecError::Malformed`] for payloads of the wrong shape, and
/// [`CodecError::Snapshot`] for snapshots that break document invariants.
pub fn decode_event(text: &str) -> Result<Event, CodecError> {
    let raw: RawFrame = serde_json::from_str(text)?;
    match raw.event.as_str() {
        JOIN_PROJECT => match raw.data {
            Value::String(project_id) if !project_id.is_empty() => Ok(Event::JoinProject { project_id }),
            _ => Err(malformed(JOIN_PROJECT, "project id must be a non-empty string")),
        },
        CANVAS_INIT => {
            let elements = parse_elements(CANVAS_INIT, raw.data)?;
            Ok(Event::CanvasInit { elements })
        }
        CANVAS_UPDATE => {
            let Value::Object(mut map) = raw.data else {
                return Err(malformed(CANVAS_UPDATE, "payload must be an object"));
            };
            let Some(Value::String(project_id)) = map.remove("projectId") else {
                return Err(malformed(CANVAS_UPDATE, "projectId must be a string"));
            };
            let elements = parse_elements(CANVAS_UPDATE, map.remove("elements").unwrap_or(Value::Null))?;
            Ok(Event::CanvasUpdate(CanvasUpdate { project_id, elements }))
        }
        ERROR => {
            let code = raw.data.get("code").and_then(Value::as_str).unwrap_or("-").to_owned();
            let message = raw.data.get("message").and_then(Value::as_str).unwrap_or("").to_owned();
            Ok(Event::Error { code, message })
        }
        _ => Err(CodecError::UnknownEvent(raw.event)),
    }
}

fn parse_elements(event: &'static str, data: Value) -> Result<Vec<CanvasElement>, CodecError> {
    if !data.is_array() {
        return Err(malformed(event, "elements must be an array"));
    }
    let elements: Vec<CanvasElement> =
        serde_json::from_value(data).map_err(|e| malformed(event, format!("bad element: {e}")))?;
    validate_snapshot(&elements).map_err(|source| CodecError::Snapshot { event, source })?;
    Ok(elements)
}

fn malformed(event: &'static str, reason: impl Into<String>) -> CodecError {
    CodecError::Malformed { event, reason: reason.into() }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;

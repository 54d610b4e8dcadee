//! Tracked event data model
//!
//! A [`TrackedEvent`] is the unit of telemetry: one captured user
//! interaction or runtime error. Events are immutable once constructed;
//! the buffer and the wire format carry them verbatim.
//!
//! ## Wire format
//!
//! Flushed batches are a bare JSON array of event records:
//!
//! ```json
//! [{"id": "btn", "type": "click", "timestamp": 1724716800000}]
//! ```
//!
//! `data` is an arbitrary JSON value, omitted when absent, and never
//! interpreted by the buffer.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Fixed id for runtime error events.
pub const GLOBAL_ERROR_ID: &str = "global-error";

/// Fixed id for unhandled rejection events.
pub const REJECTION_ID: &str = "unhandledrejection";

/// Topic on which the tracker republishes every buffered event.
pub const TRACKING_TOPIC: &str = "tracking";

/// Kind of captured occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// User clicked an annotated element
    Click,
    /// User edited an annotated input
    Input,
    /// Uncaught runtime error
    Error,
    /// Unhandled promise rejection
    Rejection,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Input => "input",
            EventKind::Error => "error",
            EventKind::Rejection => "rejection",
        }
    }

    /// Whether this kind requires an element-resolved id to be captured.
    pub fn requires_resolved_id(&self) -> bool {
        matches!(self, EventKind::Click | EventKind::Input)
    }
}

/// One captured user/runtime occurrence.
///
/// Immutable after construction; the tracker never mutates a buffered
/// entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEvent {
    /// Logical id of the tracked thing (element tracking id, or a fixed
    /// sentinel such as [`GLOBAL_ERROR_ID`]). Non-empty.
    pub id: String,

    /// Event kind
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Capture-time instant, milliseconds since epoch
    pub timestamp: i64,

    /// Opaque auxiliary data (error message/location, rejection reason)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TrackedEvent {
    /// Creates an event captured now, with no auxiliary data.
    pub fn new(id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            id: id.into(),
            kind,
            timestamp: Utc::now().timestamp_millis(),
            data: None,
        }
    }

    /// Creates an event captured now, carrying auxiliary data.
    pub fn with_data(id: impl Into<String>, kind: EventKind, data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..Self::new(id, kind)
        }
    }
}

/// Raw notification from the capture source: a kind, the tracking id
/// resolved from the originating element when there is one, and any
/// associated payload.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: EventKind,
    pub resolved_id: Option<String>,
    pub payload: Option<serde_json::Value>,
}

impl Notification {
    /// Convenience constructor for click/input notifications.
    pub fn interaction(kind: EventKind, resolved_id: Option<impl Into<String>>) -> Self {
        Self {
            kind,
            resolved_id: resolved_id.map(Into::into),
            payload: None,
        }
    }

    /// Convenience constructor for error/rejection notifications.
    pub fn failure(kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            resolved_id: None,
            payload: Some(payload),
        }
    }
}

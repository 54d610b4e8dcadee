//! Event capture, buffering, and flush
//!
//! This module holds the telemetry pipeline core: the immutable
//! [`TrackedEvent`] data model, the [`CaptureSource`] seam feeding raw
//! notifications in, and the [`Tracker`] that buffers, republishes,
//! mirrors, and flushes.

mod capture;
mod event;
mod tracker;

pub use capture::{CaptureSource, NotificationSink};
pub use event::{
    EventKind, Notification, TrackedEvent, GLOBAL_ERROR_ID, REJECTION_ID, TRACKING_TOPIC,
};
pub use tracker::Tracker;

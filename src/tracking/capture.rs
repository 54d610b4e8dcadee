//! Capture source seam
//!
//! The DOM-attachment mechanics (listener registration, selector
//! traversal) live outside the core. A [`CaptureSource`] is the injected
//! collaborator that owns those mechanics and feeds raw
//! [`Notification`]s into the tracker through a single sink function.
//! The core never holds a reference to any global document/window object.

use super::event::Notification;

/// Intake function a capture source feeds notifications into.
pub type NotificationSink = Box<dyn FnMut(Notification)>;

/// External producer of raw interaction/error notifications.
///
/// Implementations register their observers on `attach` and remove them
/// on `detach`. The sink stays valid until `detach`; notifications
/// produced after `detach` are dropped by the source, not the core.
pub trait CaptureSource {
    /// Arms capture, wiring notifications into `sink`.
    fn attach(&mut self, sink: NotificationSink);

    /// Disarms capture and releases the sink.
    fn detach(&mut self);
}

//! Tracking buffer: capture policy, batching, and flush
//!
//! [`Tracker`] accumulates [`TrackedEvent`]s, republishes each one on the
//! `"tracking"` topic for in-process consumers, mirrors locally captured
//! events to sibling contexts over the connected channel, and flushes the
//! batch to the configured endpoint when the buffer limit is reached, on
//! demand, or at unload.
//!
//! The pipeline is local-first: publishing and mirroring are best-effort
//! side channels, and delivery failures never block capture. A lost batch
//! is an accepted trade-off; there is no retry queue.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::Utc;

use crate::bus::Bus;
use crate::channel::{ContextChannel, LocalChannelHub};
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::transport::{Beacon, HttpTransport, Transport};

use super::capture::CaptureSource;
use super::event::{
    EventKind, Notification, TrackedEvent, GLOBAL_ERROR_ID, REJECTION_ID, TRACKING_TOPIC,
};

/// Where a pushed event came from.
///
/// Channel-origin events are buffered and republished locally but never
/// mirrored back onto the channel, so two instances sharing a channel
/// name cannot echo forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Local,
    Channel,
}

/// Single-threaded tracker state shared with channel and capture wiring.
struct Inner {
    endpoint: String,
    buffer_limit: usize,
    bus: Rc<Bus<TrackedEvent>>,
    buffer: Vec<TrackedEvent>,
    channel: Option<Box<dyn ContextChannel>>,
    beacon: Option<Box<dyn Beacon>>,
    transport: Option<Box<dyn Transport>>,
}

/// Buffered telemetry tracker for one page session.
///
/// Construct from a validated [`TrackerConfig`], connect the optional
/// capabilities (transport, beacon, channel, capture source), then
/// [`start`](Tracker::start) capture. The tracker lives for the page's
/// lifetime; unflushed events are lost at teardown unless
/// [`unload`](Tracker::unload) runs first.
pub struct Tracker {
    config: TrackerConfig,
    inner: Rc<RefCell<Inner>>,
    source: Option<Box<dyn CaptureSource>>,
    armed: bool,
    unloaded: bool,
}

impl Tracker {
    /// Creates a tracker with its own internal bus.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        Self::with_bus(config, Rc::new(Bus::new()))
    }

    /// Creates a tracker publishing onto an externally supplied bus.
    pub fn with_bus(config: TrackerConfig, bus: Rc<Bus<TrackedEvent>>) -> Result<Self> {
        config.validate()?;

        let inner = Inner {
            endpoint: config.endpoint.clone(),
            buffer_limit: config.buffer_limit,
            bus,
            buffer: Vec::new(),
            channel: None,
            beacon: None,
            transport: None,
        };

        Ok(Self {
            config,
            inner: Rc::new(RefCell::new(inner)),
            source: None,
            armed: false,
            unloaded: false,
        })
    }

    /// The bus this tracker publishes tracked events onto.
    pub fn bus(&self) -> Rc<Bus<TrackedEvent>> {
        self.inner.borrow().bus.clone()
    }

    /// Connects the keep-alive transport used when no beacon is present.
    pub fn set_transport(&mut self, transport: Box<dyn Transport>) {
        self.inner.borrow_mut().transport = Some(transport);
    }

    /// Connects the reqwest-backed transport for the configured endpoint.
    pub fn connect_http_transport(&mut self) -> Result<()> {
        let transport = HttpTransport::new(&self.config)?;
        self.set_transport(Box::new(transport));
        Ok(())
    }

    /// Connects the preferred unload-safe delivery capability.
    pub fn set_beacon(&mut self, beacon: Box<dyn Beacon>) {
        self.inner.borrow_mut().beacon = Some(beacon);
    }

    /// Joins a broadcast channel for cross-context mirroring.
    ///
    /// Events arriving from siblings are buffered and republished locally
    /// but not posted back (no echo).
    pub fn connect_channel(&mut self, mut channel: Box<dyn ContextChannel>) {
        let inner = Rc::downgrade(&self.inner);
        channel.on_message(Box::new(move |event| {
            if let Some(inner) = inner.upgrade() {
                push_with_origin(&inner, event, Origin::Channel);
            }
        }));
        self.inner.borrow_mut().channel = Some(channel);
    }

    /// Joins the hub channel named by `channel_name` in the config.
    pub fn connect_hub(&mut self, hub: &LocalChannelHub) {
        let endpoint = hub.connect(&self.config.channel_name);
        self.connect_channel(Box::new(endpoint));
    }

    /// Installs the capture source; armed by [`start`](Tracker::start).
    pub fn set_capture_source(&mut self, source: Box<dyn CaptureSource>) {
        self.source = Some(source);
    }

    /// Arms capture: the source starts feeding notifications into the
    /// tracker. No-op when already armed or no source is installed.
    pub fn start(&mut self) {
        if self.armed {
            return;
        }
        if let Some(source) = self.source.as_mut() {
            let inner = Rc::downgrade(&self.inner);
            source.attach(Box::new(move |notification| {
                if let Some(inner) = inner.upgrade() {
                    observe_on(&inner, notification);
                }
            }));
        }
        self.armed = true;
    }

    /// Disarms capture. Buffered events stay buffered.
    pub fn stop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(source) = self.source.as_mut() {
            source.detach();
        }
        self.armed = false;
    }

    /// Page-teardown hook: flushes whatever is buffered, exactly once.
    pub fn unload(&mut self) {
        if self.unloaded {
            return;
        }
        self.unloaded = true;
        flush_now(&self.inner);
    }

    /// Applies the capture policy to a raw notification.
    ///
    /// Click/input notifications without a resolved tracking id are
    /// silently discarded. Error and rejection notifications are always
    /// accepted under their fixed ids, carrying the payload.
    pub fn observe(&self, notification: Notification) {
        observe_on(&self.inner, notification);
    }

    /// Appends a locally produced event: buffer, publish, mirror, and
    /// flush once the buffer limit is reached.
    pub fn push(&self, event: TrackedEvent) {
        push_with_origin(&self.inner, event, Origin::Local);
    }

    /// Serializes and clears the buffer, then attempts delivery.
    ///
    /// No-op on an empty buffer. Never returns an error: delivery is
    /// at-most-once and every failure is swallowed (the batch is lost).
    pub fn flush(&self) {
        flush_now(&self.inner);
    }

    /// Number of events waiting for the next flush.
    pub fn pending_count(&self) -> usize {
        self.inner.borrow().buffer.len()
    }

    /// Whether any events are waiting for the next flush.
    pub fn has_pending(&self) -> bool {
        !self.inner.borrow().buffer.is_empty()
    }
}

fn observe_on(inner: &Rc<RefCell<Inner>>, notification: Notification) {
    let id = match notification.kind {
        EventKind::Click | EventKind::Input => match notification.resolved_id {
            Some(id) if !id.is_empty() => id,
            _ => {
                tracing::trace!(
                    kind = notification.kind.as_str(),
                    "notification without tracking id discarded"
                );
                return;
            }
        },
        EventKind::Error => GLOBAL_ERROR_ID.to_string(),
        EventKind::Rejection => REJECTION_ID.to_string(),
    };

    let event = TrackedEvent {
        id,
        kind: notification.kind,
        timestamp: Utc::now().timestamp_millis(),
        data: notification.payload,
    };

    push_with_origin(inner, event, Origin::Local);
}

fn push_with_origin(inner: &Rc<RefCell<Inner>>, event: TrackedEvent, origin: Origin) {
    inner.borrow_mut().buffer.push(event.clone());

    // Best-effort side channel: a failing subscriber halts the fan-out
    // for this publish but never the buffering or delivery path.
    let bus = inner.borrow().bus.clone();
    if let Err(e) = bus.publish(TRACKING_TOPIC, &event) {
        tracing::debug!(
            topic = TRACKING_TOPIC,
            error = %e,
            "subscriber failed, event kept"
        );
    }

    if origin == Origin::Local {
        let guard = inner.borrow();
        if let Some(channel) = &guard.channel {
            channel.post(&event);
        }
    }

    // Checked once per push; a synchronous burst may transiently exceed
    // the limit before this flush clears it.
    let should_flush = {
        let guard = inner.borrow();
        guard.buffer.len() >= guard.buffer_limit
    };
    if should_flush {
        flush_now(inner);
    }
}

fn flush_now(inner: &Rc<RefCell<Inner>>) {
    // Snapshot-and-reset in one step: a push arriving during delivery
    // starts a fresh buffer, and no payload is ever read twice.
    let (batch, endpoint) = {
        let mut guard = inner.borrow_mut();
        if guard.buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut guard.buffer);
        (batch, guard.endpoint.clone())
    };

    let payload = match serde_json::to_vec(&batch) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(
                count = batch.len(),
                error = %e,
                "failed to serialize batch, events dropped"
            );
            return;
        }
    };

    let guard = inner.borrow();
    if let Some(beacon) = &guard.beacon {
        if beacon.send(&endpoint, &payload) {
            tracing::debug!(endpoint = %endpoint, count = batch.len(), "batch handed to beacon");
        } else {
            tracing::warn!(endpoint = %endpoint, count = batch.len(), "beacon rejected payload, batch dropped");
        }
        return;
    }

    if let Some(transport) = &guard.transport {
        transport.post(&endpoint, payload);
        tracing::debug!(endpoint = %endpoint, count = batch.len(), "batch handed to transport");
    } else {
        tracing::debug!(endpoint = %endpoint, count = batch.len(), "no transport connected, batch dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingTransport {
        sent: Rc<RefCell<Vec<(String, Vec<u8>)>>>,
    }

    impl Transport for RecordingTransport {
        fn post(&self, endpoint: &str, body: Vec<u8>) {
            self.sent.borrow_mut().push((endpoint.to_string(), body));
        }
    }

    fn tracker_with_transport(
        buffer_limit: usize,
    ) -> (Tracker, Rc<RefCell<Vec<(String, Vec<u8>)>>>) {
        let config = TrackerConfig {
            buffer_limit,
            ..TrackerConfig::new("/t")
        };
        let mut tracker = Tracker::new(config).unwrap();
        let sent = Rc::new(RefCell::new(Vec::new()));
        tracker.set_transport(Box::new(RecordingTransport { sent: sent.clone() }));
        (tracker, sent)
    }

    fn payload_events(body: &[u8]) -> Vec<TrackedEvent> {
        serde_json::from_slice(body).unwrap()
    }

    #[test]
    fn test_push_buffers_in_order_below_limit() {
        let (tracker, sent) = tracker_with_transport(10);

        tracker.push(TrackedEvent::new("a", EventKind::Click));
        tracker.push(TrackedEvent::new("b", EventKind::Input));
        tracker.push(TrackedEvent::new("c", EventKind::Click));

        assert_eq!(tracker.pending_count(), 3);
        assert!(sent.borrow().is_empty());

        tracker.flush();
        let sent = sent.borrow();
        let events = payload_events(&sent[0].1);
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reaching_limit_triggers_single_flush() {
        let (tracker, sent) = tracker_with_transport(3);

        tracker.push(TrackedEvent::new("a", EventKind::Click));
        tracker.push(TrackedEvent::new("b", EventKind::Click));
        assert!(sent.borrow().is_empty());

        tracker.push(TrackedEvent::new("c", EventKind::Click));

        assert_eq!(sent.borrow().len(), 1);
        assert_eq!(tracker.pending_count(), 0);
        assert_eq!(payload_events(&sent.borrow()[0].1).len(), 3);
    }

    #[test]
    fn test_flush_empty_buffer_is_noop() {
        let (tracker, sent) = tracker_with_transport(10);
        tracker.flush();
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_observe_click_without_id_discarded() {
        let (tracker, sent) = tracker_with_transport(10);
        let published = Rc::new(RefCell::new(0usize));
        let published_inner = published.clone();
        tracker.bus().subscribe(
            TRACKING_TOPIC,
            Rc::new(move |_: &TrackedEvent| {
                *published_inner.borrow_mut() += 1;
                Ok(())
            }),
        );

        tracker.observe(Notification::interaction(EventKind::Click, None::<String>));
        tracker.observe(Notification {
            kind: EventKind::Input,
            resolved_id: Some(String::new()),
            payload: None,
        });

        assert_eq!(tracker.pending_count(), 0);
        assert_eq!(*published.borrow(), 0);
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_observe_error_uses_fixed_id_and_payload() {
        let (tracker, sent) = tracker_with_transport(1);

        tracker.observe(Notification::failure(
            EventKind::Error,
            serde_json::json!({"message": "boom", "lineno": 3}),
        ));

        let sent = sent.borrow();
        let events = payload_events(&sent[0].1);
        assert_eq!(events[0].id, GLOBAL_ERROR_ID);
        assert_eq!(events[0].kind, EventKind::Error);
        assert_eq!(events[0].data.as_ref().unwrap()["message"], "boom");
    }

    #[test]
    fn test_observe_rejection_uses_fixed_id() {
        let (tracker, sent) = tracker_with_transport(1);

        tracker.observe(Notification::failure(
            EventKind::Rejection,
            serde_json::json!({"reason": "nope"}),
        ));

        let sent = sent.borrow();
        let events = payload_events(&sent[0].1);
        assert_eq!(events[0].id, REJECTION_ID);
        assert_eq!(events[0].kind, EventKind::Rejection);
    }

    #[test]
    fn test_push_publishes_on_tracking_topic() {
        let (tracker, _sent) = tracker_with_transport(10);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_inner = seen.clone();
        tracker.bus().subscribe(
            TRACKING_TOPIC,
            Rc::new(move |event: &TrackedEvent| {
                seen_inner.borrow_mut().push(event.clone());
                Ok(())
            }),
        );

        let event = TrackedEvent::new("btn", EventKind::Click);
        tracker.push(event.clone());

        assert_eq!(*seen.borrow(), vec![event]);
    }

    #[test]
    fn test_failing_subscriber_does_not_block_buffering() {
        let (tracker, sent) = tracker_with_transport(1);
        tracker.bus().subscribe(
            TRACKING_TOPIC,
            Rc::new(|_: &TrackedEvent| {
                Err(crate::error::Error::Subscriber("broken overlay".to_string()))
            }),
        );

        tracker.push(TrackedEvent::new("btn", EventKind::Click));

        // Event still buffered and flushed despite the subscriber error
        assert_eq!(sent.borrow().len(), 1);
    }

    #[test]
    fn test_unload_flushes_exactly_once() {
        let (mut tracker, sent) = tracker_with_transport(10);
        tracker.push(TrackedEvent::new("a", EventKind::Click));

        tracker.unload();
        tracker.unload();

        assert_eq!(sent.borrow().len(), 1);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_beacon_preferred_over_transport() {
        struct RecordingBeacon {
            sent: Rc<RefCell<Vec<Vec<u8>>>>,
        }
        impl Beacon for RecordingBeacon {
            fn send(&self, _endpoint: &str, payload: &[u8]) -> bool {
                self.sent.borrow_mut().push(payload.to_vec());
                true
            }
        }

        let (mut tracker, transport_sent) = tracker_with_transport(10);
        let beacon_sent = Rc::new(RefCell::new(Vec::new()));
        tracker.set_beacon(Box::new(RecordingBeacon {
            sent: beacon_sent.clone(),
        }));

        tracker.push(TrackedEvent::new("a", EventKind::Click));
        tracker.flush();

        assert_eq!(beacon_sent.borrow().len(), 1);
        assert!(transport_sent.borrow().is_empty());
    }

    #[test]
    fn test_flush_without_any_transport_drops_batch() {
        let tracker = Tracker::new(TrackerConfig::new("/t")).unwrap();
        tracker.push(TrackedEvent::new("a", EventKind::Click));

        // Nothing connected: flush must swallow, clear, and not panic
        tracker.flush();
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Tracker::new(TrackerConfig::new("")).is_err());
        let config = TrackerConfig {
            buffer_limit: 0,
            ..TrackerConfig::new("/t")
        };
        assert!(Tracker::new(config).is_err());
    }
}

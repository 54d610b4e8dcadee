//! Topic bus for in-process publish/subscribe fan-out.
//!
//! [`Bus`] decouples producers of tracked events from consumers (debug
//! overlays, analytics adapters) without those consumers depending on the
//! capture or transport layers.
//!
//! - [`Bus::subscribe`] appends a handler to a named topic.
//! - [`Bus::unsubscribe`] removes the first registration of a handler.
//! - [`Bus::publish`] invokes handlers synchronously, in registration
//!   order, stopping at the first failure.
//!
//! This is used by the [`Tracker`](crate::tracking::Tracker) to republish
//! every buffered event on the `"tracking"` topic.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Result;

/// A topic subscriber callback.
///
/// Handlers are reference-counted so the same handler can be registered
/// on several topics (or several times on one topic) and later removed
/// by identity.
pub type Handler<T> = Rc<dyn Fn(&T) -> Result<()>>;

/// In-process publish/subscribe registry, keyed by topic name.
///
/// Topics are created lazily on first subscribe. The registry is
/// single-threaded; interior mutability lets producers and consumers
/// share one bus behind an `Rc`.
pub struct Bus<T> {
    topics: RefCell<HashMap<String, Vec<Handler<T>>>>,
}

impl<T> Bus<T> {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            topics: RefCell::new(HashMap::new()),
        }
    }

    /// Registers `handler` under `topic`.
    ///
    /// No uniqueness constraint: registering the same handler twice means
    /// it runs once per registration.
    pub fn subscribe(&self, topic: &str, handler: Handler<T>) {
        self.topics
            .borrow_mut()
            .entry(topic.to_string())
            .or_default()
            .push(handler);
    }

    /// Removes the first registration of `handler` under `topic`.
    ///
    /// No-op if the topic is unknown or the handler is not registered.
    pub fn unsubscribe(&self, topic: &str, handler: &Handler<T>) {
        let mut topics = self.topics.borrow_mut();
        if let Some(handlers) = topics.get_mut(topic) {
            if let Some(pos) = handlers.iter().position(|h| Rc::ptr_eq(h, handler)) {
                handlers.remove(pos);
            }
        }
    }

    /// Publishes `data` to every handler registered under `topic`.
    ///
    /// Handlers run synchronously in registration order and receive a
    /// shared reference to `data`. The first handler returning an error
    /// halts the fan-out and that error is returned; later handlers are
    /// not invoked for this call. An unknown topic publishes to zero
    /// handlers and succeeds.
    ///
    /// The handler list is snapshotted at call time: a handler registered
    /// while a publish is in progress is not invoked for that call.
    pub fn publish(&self, topic: &str, data: &T) -> Result<()> {
        let handlers: Vec<Handler<T>> = self
            .topics
            .borrow()
            .get(topic)
            .map(|h| h.to_vec())
            .unwrap_or_default();

        for handler in handlers {
            handler(data)?;
        }
        Ok(())
    }

    /// Number of handlers currently registered under `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .borrow()
            .get(topic)
            .map(|h| h.len())
            .unwrap_or(0)
    }
}

impl<T> Default for Bus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn recording_handler(log: Rc<RefCell<Vec<String>>>, tag: &'static str) -> Handler<String> {
        Rc::new(move |data: &String| {
            log.borrow_mut().push(format!("{}:{}", tag, data));
            Ok(())
        })
    }

    #[test]
    fn test_publish_in_registration_order() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        bus.subscribe("topic", recording_handler(log.clone(), "a"));
        bus.subscribe("topic", recording_handler(log.clone(), "b"));

        bus.publish("topic", &"x".to_string()).unwrap();
        assert_eq!(*log.borrow(), vec!["a:x", "b:x"]);
    }

    #[test]
    fn test_publish_unknown_topic_succeeds() {
        let bus: Bus<String> = Bus::new();
        assert!(bus.publish("nobody-home", &"x".to_string()).is_ok());
    }

    #[test]
    fn test_duplicate_registration_invoked_per_registration() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let handler = recording_handler(log.clone(), "h");

        bus.subscribe("topic", handler.clone());
        bus.subscribe("topic", handler.clone());

        bus.publish("topic", &"x".to_string()).unwrap();
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_unsubscribe_removes_one_registration() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let handler = recording_handler(log.clone(), "h");

        bus.subscribe("topic", handler.clone());
        bus.subscribe("topic", handler.clone());
        bus.unsubscribe("topic", &handler);
        assert_eq!(bus.subscriber_count("topic"), 1);

        bus.publish("topic", &"x".to_string()).unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_unsubscribe_keeps_other_handlers() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = recording_handler(log.clone(), "a");
        let second = recording_handler(log.clone(), "b");

        bus.subscribe("topic", first.clone());
        bus.subscribe("topic", second);
        bus.unsubscribe("topic", &first);

        bus.publish("topic", &"x".to_string()).unwrap();
        assert_eq!(*log.borrow(), vec!["b:x"]);
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let handler = recording_handler(log, "h");

        // Neither topic nor handler exists; must not error or panic
        bus.unsubscribe("ghost", &handler);
    }

    #[test]
    fn test_publish_fail_fast() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        bus.subscribe("topic", recording_handler(log.clone(), "a"));
        bus.subscribe(
            "topic",
            Rc::new(|_: &String| Err(Error::Subscriber("boom".to_string()))),
        );
        bus.subscribe("topic", recording_handler(log.clone(), "c"));

        let err = bus.publish("topic", &"x".to_string()).unwrap_err();
        assert!(matches!(err, Error::Subscriber(_)));
        // Handler after the failing one never ran
        assert_eq!(*log.borrow(), vec!["a:x"]);
    }

    #[test]
    fn test_handler_registered_during_publish_not_invoked() {
        let bus = Rc::new(Bus::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let bus_inner = bus.clone();
        let log_inner = log.clone();
        bus.subscribe(
            "topic",
            Rc::new(move |_: &String| {
                bus_inner.subscribe("topic", recording_handler(log_inner.clone(), "late"));
                Ok(())
            }),
        );

        bus.publish("topic", &"x".to_string()).unwrap();
        assert!(log.borrow().is_empty());

        // The late handler participates in the next publish
        bus.publish("topic", &"y".to_string()).unwrap();
        assert_eq!(*log.borrow(), vec!["late:y"]);
    }

    #[test]
    fn test_data_passed_unchanged() {
        let bus = Bus::new();
        let seen = Rc::new(RefCell::new(None));
        let seen_inner = seen.clone();

        bus.subscribe(
            "topic",
            Rc::new(move |data: &String| {
                *seen_inner.borrow_mut() = Some(data.clone());
                Ok(())
            }),
        );

        bus.publish("topic", &"payload".to_string()).unwrap();
        assert_eq!(seen.borrow().as_deref(), Some("payload"));
    }
}

//! Cross-context mirroring channel
//!
//! Sibling browsing contexts of the same page share tracked events over a
//! named broadcast channel. The channel is an optional injected
//! capability: when absent the tracker simply skips mirroring.
//!
//! [`LocalChannelHub`] is an in-process implementation joining endpoints
//! by channel name, used by tests and embedders that host several tracker
//! instances in one process. Delivery is synchronous and best-effort;
//! endpoints never receive their own posts.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::tracking::TrackedEvent;

/// Handler invoked for events arriving from sibling contexts.
pub type MessageHandler = Box<dyn FnMut(TrackedEvent)>;

/// Best-effort broadcast channel shared by sibling contexts.
pub trait ContextChannel {
    /// Mirrors an event to every sibling on the same channel name.
    /// Must not deliver back to this endpoint.
    fn post(&self, event: &TrackedEvent);

    /// Registers the handler invoked for events posted by siblings.
    /// Replaces any previously registered handler.
    fn on_message(&mut self, handler: MessageHandler);

    /// The channel name this endpoint is joined to.
    fn name(&self) -> &str;
}

type HandlerSlot = Rc<RefCell<Option<MessageHandler>>>;

#[derive(Clone)]
struct Endpoint {
    id: usize,
    handler: HandlerSlot,
}

#[derive(Default)]
struct HubState {
    next_id: usize,
    channels: HashMap<String, Vec<Endpoint>>,
}

/// In-process hub joining [`LocalChannel`] endpoints by name.
///
/// Cloning the hub shares the underlying registry, so every endpoint
/// connected through any clone sees the same channels.
#[derive(Clone, Default)]
pub struct LocalChannelHub {
    state: Rc<RefCell<HubState>>,
}

impl LocalChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects a new endpoint to `name`.
    pub fn connect(&self, name: &str) -> LocalChannel {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;

        let handler: HandlerSlot = Rc::new(RefCell::new(None));
        state
            .channels
            .entry(name.to_string())
            .or_default()
            .push(Endpoint {
                id,
                handler: handler.clone(),
            });

        LocalChannel {
            state: self.state.clone(),
            name: name.to_string(),
            id,
            handler,
        }
    }
}

/// One endpoint on a [`LocalChannelHub`] channel.
pub struct LocalChannel {
    state: Rc<RefCell<HubState>>,
    name: String,
    id: usize,
    handler: HandlerSlot,
}

impl ContextChannel for LocalChannel {
    fn post(&self, event: &TrackedEvent) {
        // Snapshot sibling handles first: a receiving handler may connect
        // or drop endpoints while we deliver.
        let siblings: Vec<Endpoint> = self
            .state
            .borrow()
            .channels
            .get(&self.name)
            .map(|endpoints| {
                endpoints
                    .iter()
                    .filter(|ep| ep.id != self.id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for sibling in siblings {
            if let Some(handler) = sibling.handler.borrow_mut().as_mut() {
                handler(event.clone());
            }
        }
    }

    fn on_message(&mut self, handler: MessageHandler) {
        *self.handler.borrow_mut() = Some(handler);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        if let Some(endpoints) = state.channels.get_mut(&self.name) {
            endpoints.retain(|ep| ep.id != self.id);
        }
    }
}

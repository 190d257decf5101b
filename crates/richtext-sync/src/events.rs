//! Event infrastructure for richtext-sync.
//!
//! Provides `SyncEvent` for debug/monitoring and a single-threaded `EventBus`
//! used for every subscription in the crate: diagnostics, host editor update
//! listeners, and (downstream) form watchers.

use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Sync events emitted by the controller for real-time monitoring.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    /// One-time announcement after an editor mounted.
    Mounted {
        #[serde(rename = "editorId")]
        editor_id: String,
        /// Milliseconds since Unix epoch.
        timestamp: f64,
    },
    /// The internal tree was rebuilt from an external snapshot.
    ReconciliationApplied {
        #[serde(rename = "editorId")]
        editor_id: String,
        /// Number of top-level nodes in the rebuilt tree.
        #[serde(rename = "topLevelNodes")]
        top_level_nodes: usize,
        /// Substructures that could not be reconstructed.
        dropped: usize,
        timestamp: f64,
    },
    /// An external value matched the tree's own last serialization; nothing rebuilt.
    ExternalEchoSkipped {
        #[serde(rename = "editorId")]
        editor_id: String,
        timestamp: f64,
    },
    /// A genuine user edit was forwarded to the owner.
    ChangeEmitted {
        #[serde(rename = "editorId")]
        editor_id: String,
        timestamp: f64,
    },
    /// The update produced by a reconciliation was swallowed.
    EchoSuppressed {
        #[serde(rename = "editorId")]
        editor_id: String,
        timestamp: f64,
    },
    /// Content lost while degrading an unsupported node.
    ContentDropped {
        #[serde(rename = "editorId")]
        editor_id: String,
        /// Position of the node, e.g. `root.2.0`.
        path: String,
        /// The node's declared kind (`<none>` if it had none).
        kind: String,
        reason: String,
        timestamp: f64,
    },
}

/// Milliseconds since Unix epoch (works in WASM).
pub(crate) fn now_millis() -> f64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

trait Unsubscribe {
    fn unsubscribe(&self, id: usize);
}

/// Subscription handle that unsubscribes automatically when dropped.
///
/// Follows the disposer pattern: hold this value to keep receiving events,
/// drop it (or let it go out of scope) to unsubscribe.
pub struct Subscription {
    bus: Weak<dyn Unsubscribe>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

/// Event bus for publishing events to subscribers.
///
/// Single-threaded: everything runs on one cooperative event loop.
/// Wrap in `Rc` to enable subscriptions.
pub struct EventBus<E> {
    callbacks: RefCell<Vec<(usize, Rc<dyn Fn(&E)>)>>,
    next_id: Cell<usize>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            callbacks: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }
}

impl<E: 'static> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. Returns `Subscription` that unsubscribes on drop.
    ///
    /// Requires `self` to be wrapped in `Rc`.
    pub fn subscribe(self: &Rc<Self>, callback: impl Fn(&E) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.callbacks.borrow_mut().push((id, Rc::new(callback)));
        let bus: Weak<dyn Unsubscribe> = Rc::downgrade(self) as Weak<dyn Unsubscribe>;
        Subscription { bus, id }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: &E) {
        // Clone the callback list so a callback may subscribe or unsubscribe.
        let callbacks: Vec<_> = self
            .callbacks
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.borrow().len()
    }
}

impl<E> Unsubscribe for EventBus<E> {
    fn unsubscribe(&self, id: usize) {
        self.callbacks.borrow_mut().retain(|(i, _)| *i != id);
    }
}

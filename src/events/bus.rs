//! Per-store event registry and broadcaster.

use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::types::{EventKind, StoreEvent, SubscriptionHandle, SubscriptionId};

type Handler<T> = Arc<dyn Fn(&StoreEvent<T>) + Send + Sync>;

/// How a registered listener receives events.
enum Listener<T> {
    Callback(Handler<T>),
    Channel(Sender<StoreEvent<T>>),
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        match self {
            Listener::Callback(handler) => Listener::Callback(Arc::clone(handler)),
            Listener::Channel(sender) => Listener::Channel(sender.clone()),
        }
    }
}

struct Registration<T> {
    id: SubscriptionId,
    listener: Listener<T>,
}

type Registry<T> = RwLock<HashMap<EventKind, Vec<Registration<T>>>>;

/// Removes one handler when invoked. Dropping it without calling
/// [`Unsubscribe::unsubscribe`] leaves the handler registered.
pub struct Unsubscribe {
    remove: Box<dyn FnOnce() + Send>,
}

impl Unsubscribe {
    pub fn unsubscribe(self) {
        (self.remove)()
    }
}

/// Typed publish/subscribe registry owned by one store.
pub struct EventBus<T> {
    /// Store name, used for diagnostics.
    name: String,
    /// Mirror every emission to `tracing`.
    debug: bool,
    registry: Arc<Registry<T>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl<T: Clone + Send + 'static> EventBus<T> {
    pub fn new(name: impl Into<String>, debug: bool) -> Self {
        Self {
            name: name.into(),
            debug,
            registry: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback for one event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Unsubscribe
    where
        F: Fn(&StoreEvent<T>) + Send + Sync + 'static,
    {
        let id = self.register(kind, Listener::Callback(Arc::new(handler)));
        let registry: Weak<Registry<T>> = Arc::downgrade(&self.registry);

        Unsubscribe {
            remove: Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    Self::remove(&registry, kind, id);
                }
            }),
        }
    }

    /// Subscribe to one event kind over a bounded channel.
    pub fn subscribe(&self, kind: EventKind, buffer_size: usize) -> SubscriptionHandle<T> {
        let (sender, receiver) = bounded(buffer_size.max(1));
        let id = self.register(kind, Listener::Channel(sender));
        SubscriptionHandle { id, kind, receiver }
    }

    /// Remove a channel subscription.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle<T>) {
        Self::remove(&self.registry, handle.kind, handle.id);
    }

    /// Deliver an event to every listener registered for its kind.
    pub fn emit(&self, event: StoreEvent<T>) {
        if self.debug {
            tracing::debug!(
                store = %self.name,
                kind = ?event.kind,
                timestamp = event.timestamp.0,
                "store event"
            );
        }

        // Snapshot so handlers can (un)subscribe while being called.
        let listeners: Vec<(SubscriptionId, Listener<T>)> = {
            let registry = self.registry.read();
            match registry.get(&event.kind) {
                Some(regs) => regs.iter().map(|r| (r.id, r.listener.clone())).collect(),
                None => return,
            }
        };

        let mut dropped = Vec::new();
        for (id, listener) in listeners {
            match listener {
                Listener::Callback(handler) => handler(&event),
                Listener::Channel(sender) => {
                    if sender.try_send(event.clone()).is_err() {
                        dropped.push(id);
                    }
                }
            }
        }

        for id in dropped {
            tracing::debug!(store = %self.name, kind = ?event.kind, id = id.0, "dropping slow subscriber");
            Self::remove(&self.registry, event.kind, id);
        }
    }

    /// Number of listeners for one kind.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry.read().get(&kind).map_or(0, Vec::len)
    }

    /// Number of listeners across all kinds.
    pub fn total_listeners(&self) -> usize {
        self.registry.read().values().map(Vec::len).sum()
    }

    /// Drop every handler and subscription.
    pub fn destroy(&self) {
        self.registry.write().clear();
    }

    fn register(&self, kind: EventKind, listener: Listener<T>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.registry
            .write()
            .entry(kind)
            .or_default()
            .push(Registration { id, listener });
        id
    }

    fn remove(registry: &Registry<T>, kind: EventKind, id: SubscriptionId) {
        let mut registry = registry.write();
        if let Some(regs) = registry.get_mut(&kind) {
            regs.retain(|r| r.id != id);
            if regs.is_empty() {
                registry.remove(&kind);
            }
        }
    }
}

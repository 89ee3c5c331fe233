//! Change-notification registry for store consumers.
//!
//! A bare observer: callbacks carry no payload. Notified consumers re-read
//! whatever slice they care about through the store's query API.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

type Listener = Box<dyn Fn() + Send + Sync>;

/// Registry of change listeners.
pub struct SubscriptionManager {
    listeners: RwLock<HashMap<SubscriptionId, Listener>>,
    next_id: AtomicU64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener. Each call registers exactly one callback.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().insert(id, Box::new(listener));
        id
    }

    /// Remove a listener. Removing an unknown id is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.write().remove(&id);
    }

    /// Invoke every registered listener, in arbitrary order.
    pub fn notify_all(&self) {
        let listeners = self.listeners.read();
        for listener in listeners.values() {
            listener();
        }
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

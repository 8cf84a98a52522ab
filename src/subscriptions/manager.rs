//! Subscriber registry with queued delivery.

use crate::types::SubscriptionId;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use super::types::Unsubscribe;

/// Callback invoked with each notified state.
pub type Callback<S> = Arc<dyn Fn(&S)>;

/// Registered subscribers, notified in registration order.
///
/// Delivery is queued: a notification raised while another is being
/// delivered (a subscriber that updates the reactor) is appended to the queue
/// and delivered once the current round completes. Every subscriber therefore
/// sees every state exactly once, in the order the states were committed.
pub struct SubscriberRegistry<S> {
    /// Ids are allocated in increasing order, so key order is registration order.
    subscribers: RwLock<BTreeMap<SubscriptionId, Callback<S>>>,
    next_id: AtomicU64,
    pending: Mutex<VecDeque<S>>,
    draining: AtomicBool,
}

impl<S> SubscriberRegistry<S> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            pending: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        }
    }

    /// Register a callback.
    pub fn add(&self, callback: Callback<S>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.write().insert(id, callback);
        trace!(%id, "subscriber added");
        id
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Drop every subscriber and any queued notification.
    pub fn clear(&self) {
        self.subscribers.write().clear();
        self.pending.lock().clear();
    }

    /// Queue `state` for delivery and drain the queue unless an outer call
    /// is already draining it.
    pub fn notify(&self, state: S) {
        self.enqueue(state);
        self.flush();
    }

    /// Append `state` to the queue without delivering it.
    pub fn enqueue(&self, state: S) {
        self.pending.lock().push_back(state);
    }

    /// Deliver everything queued, unless an outer call is already draining.
    pub fn flush(&self) {
        if self.draining.swap(true, Ordering::SeqCst) {
            trace!("notification queued behind in-flight delivery");
            return;
        }
        let _guard = DrainGuard { registry: self };

        loop {
            let next = self.pending.lock().pop_front();
            match next {
                Some(state) => self.deliver(&state),
                None => break,
            }
        }
    }

    /// One delivery round. The subscriber list is copied first so callbacks
    /// may subscribe or unsubscribe freely; anyone removed before their turn
    /// is skipped, anyone added joins from the next round.
    fn deliver(&self, state: &S) {
        let round: Vec<(SubscriptionId, Callback<S>)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        for (id, callback) in round {
            if self.contains(id) {
                callback(state);
            }
        }
    }
}

impl<S> Default for SubscriberRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Unsubscribe for SubscriberRegistry<S> {
    fn remove(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.write().remove(&id).is_some();
        if removed {
            trace!(%id, "subscriber removed");
        }
        removed
    }
}

/// Resets the draining flag even if a subscriber panics.
struct DrainGuard<'a, S> {
    registry: &'a SubscriberRegistry<S>,
}

impl<S> Drop for DrainGuard<'_, S> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.registry.pending.lock().clear();
        }
        self.registry.draining.store(false, Ordering::SeqCst);
    }
}

//! Subscription handles and selector options.

use crate::types::SubscriptionId;
use std::fmt;
use std::sync::{Arc, Weak};

/// Anything a [`Subscription`] can detach itself from.
pub(crate) trait Unsubscribe {
    /// Remove a subscriber. Returns false if it was already gone.
    fn remove(&self, id: SubscriptionId) -> bool;
}

/// Handle to a registered subscriber.
///
/// Dropping the handle does not unsubscribe; call
/// [`unsubscribe`](Subscription::unsubscribe) explicitly. The handle holds no
/// strong reference to the reactor.
pub struct Subscription {
    pub id: SubscriptionId,
    registry: Weak<dyn Unsubscribe>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, registry: Weak<dyn Unsubscribe>) -> Self {
        Self { id, registry }
    }

    /// Stop receiving notifications. Safe to call more than once, from inside
    /// a notification, or after the reactor is gone.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Equality used to decide whether a selected value changed.
pub type EqualityFn<T> = Arc<dyn Fn(&T, &T) -> bool>;

/// Options for [`Reactor::select`](crate::Reactor::select).
pub struct SelectOptions<T> {
    /// Custom equality. Default: `PartialEq`.
    pub equality: Option<EqualityFn<T>>,

    /// Call the listener once at registration with `(initial, None)`.
    /// Default: true
    pub fire_immediately: bool,
}

impl<T> Default for SelectOptions<T> {
    fn default() -> Self {
        Self {
            equality: None,
            fire_immediately: true,
        }
    }
}

impl<T> SelectOptions<T> {
    pub fn with_equality<F>(mut self, equality: F) -> Self
    where
        F: Fn(&T, &T) -> bool + 'static,
    {
        self.equality = Some(Arc::new(equality));
        self
    }

    pub fn fire_immediately(mut self, fire: bool) -> Self {
        self.fire_immediately = fire;
        self
    }
}

//! Derived subscriptions that fire only when a selected value changes.

use parking_lot::Mutex;

use super::types::EqualityFn;

/// Tracks the last selected value for one `select` registration.
pub(crate) struct Selection<S, T> {
    selector: Box<dyn Fn(&S) -> T>,
    on_changed: Box<dyn Fn(&T, Option<&T>)>,
    equality: EqualityFn<T>,
    last: Mutex<Option<T>>,
}

impl<S, T: Clone> Selection<S, T> {
    pub(crate) fn new(
        selector: Box<dyn Fn(&S) -> T>,
        on_changed: Box<dyn Fn(&T, Option<&T>)>,
        equality: EqualityFn<T>,
    ) -> Self {
        Self {
            selector,
            on_changed,
            equality,
            last: Mutex::new(None),
        }
    }

    /// Record the value at registration time, optionally reporting it.
    pub(crate) fn prime(&self, state: &S, fire: bool) {
        let initial = (self.selector)(state);
        *self.last.lock() = Some(initial.clone());
        if fire {
            (self.on_changed)(&initial, None);
        }
    }

    /// Re-run the selector and report a change if the value moved.
    pub(crate) fn observe(&self, state: &S) {
        let next = (self.selector)(state);
        let prev = {
            let mut last = self.last.lock();
            if let Some(prev) = last.as_ref() {
                if (self.equality)(&next, prev) {
                    return;
                }
            }
            last.replace(next.clone())
        };
        // The lock is released so the listener may update the reactor.
        (self.on_changed)(&next, prev.as_ref());
    }
}

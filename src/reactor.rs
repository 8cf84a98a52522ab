//! Reactor: the live state and its update pipeline.

use crate::error::{ReactorError, Result};
use crate::history::{HistorySnapshot, HistoryStack};
use crate::middleware::MiddlewareChain;
use crate::plugins::{Initialized, Plugin, PluginHost};
use crate::state::{Merge, State};
use crate::subscriptions::{
    Callback, EqualityFn, SelectOptions, Selection, SubscriberRegistry, Subscription, Unsubscribe,
};
use crate::types::{Lifecycle, SubscriptionId, REDO_ACTION, UNDO_ACTION};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Called after every committed change with `(state, prev_state, action)`.
pub type ChangeCallback<S> = Box<dyn Fn(&S, &S, Option<&str>)>;

/// Reactor construction options.
pub struct ReactorOptions<S> {
    /// Name used in logs, errors and inspection.
    pub name: Option<String>,

    /// Plugins, initialized in order.
    pub plugins: Vec<Box<dyn Plugin<S>>>,

    /// Runs after middleware on every committed change.
    pub on_change: Option<ChangeCallback<S>>,
}

impl<S> Default for ReactorOptions<S> {
    fn default() -> Self {
        Self {
            name: None,
            plugins: Vec::new(),
            on_change: None,
        }
    }
}

impl<S> ReactorOptions<S> {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_plugin(mut self, plugin: impl Plugin<S> + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn with_on_change<F>(mut self, on_change: F) -> Self
    where
        F: Fn(&S, &S, Option<&str>) + 'static,
    {
        self.on_change = Some(Box::new(on_change));
        self
    }
}

/// Everything a devtools panel needs to render a reactor.
#[derive(Clone, Debug, Serialize)]
pub struct Inspection<S> {
    pub name: Option<String>,
    pub lifecycle: Lifecycle,
    pub state: S,
    pub history: Option<HistorySnapshot<S>>,
    pub middlewares: Vec<String>,
    pub plugins: Vec<String>,
    pub subscribers: usize,
}

#[derive(Default)]
struct BatchState {
    depth: usize,
    /// An update happened inside the open batch.
    dirty: bool,
}

struct Inner<S> {
    name: Option<String>,
    lifecycle: RwLock<Lifecycle>,
    state: Mutex<S>,
    history: Option<Mutex<HistoryStack<S>>>,
    middlewares: MiddlewareChain<S>,
    plugins: Mutex<PluginHost<S>>,
    subscribers: Arc<SubscriberRegistry<S>>,
    on_change: Option<ChangeCallback<S>>,
    batch: Mutex<BatchState>,
    /// Commits in flight. Only the outermost one delivers notifications.
    commits: AtomicUsize,
    /// Set while before-hooks and the history push run.
    observing: AtomicBool,
}

/// Owns a live state and runs every change through the update pipeline:
///
/// 1. the mutator edits the live state in place
/// 2. middleware `on_before_update` hooks observe `(prev, next)`
/// 3. history records `prev` (subject to its filters)
/// 4. middleware `on_after_update` hooks run
/// 5. `on_change` runs
/// 6. subscribers receive a snapshot of `next`
///
/// `Reactor` is a cheap handle; clones share the same state. Callbacks that
/// need the reactor should hold a [`WeakReactor`] to avoid a reference cycle
/// through the subscriber list.
///
/// Re-entrancy: subscribers, selectors, after-hooks and `on_change` may call
/// back into the reactor. A nested update commits immediately, but its
/// subscriber notification is queued behind the update that triggered it, so
/// subscribers always see states in commit order. Mutators and
/// `on_before_update` hooks may not change their own reactor: doing so
/// returns [`ReactorError::ReentrantUpdate`].
pub struct Reactor<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Reactor<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Non-owning reference to a [`Reactor`].
pub struct WeakReactor<S> {
    inner: Weak<Inner<S>>,
}

impl<S> Clone for WeakReactor<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S> WeakReactor<S> {
    pub fn upgrade(&self) -> Option<Reactor<S>> {
        self.inner.upgrade().map(|inner| Reactor { inner })
    }
}

#[derive(Clone, Copy)]
enum Travel {
    Undo,
    Redo,
}

impl<S: State> Reactor<S> {
    /// Create a reactor with no plugins.
    pub fn new(initial: S) -> Self {
        let init = Initialized {
            host: PluginHost::empty(),
            history: None,
            middlewares: Vec::new(),
        };
        Self::assemble(initial, None, init, None)
    }

    /// Create a reactor and run its plugins. A plugin whose `init` fails
    /// aborts construction with that error.
    pub fn with_options(initial: S, options: ReactorOptions<S>) -> Result<Self> {
        let ReactorOptions {
            name,
            plugins,
            on_change,
        } = options;
        let mut state = initial;

        debug!(reactor = ?name, plugins = plugins.len(), lifecycle = ?Lifecycle::Initializing, "initializing reactor");
        let mut init = PluginHost::initialize(plugins, &mut state, name.as_deref())?;
        // Plugins after the history plugin may have rewritten the state.
        if let Some(history) = init.history.as_mut() {
            history.rebase(&state);
        }

        Ok(Self::assemble(state, name, init, on_change))
    }

    fn assemble(
        state: S,
        name: Option<String>,
        init: Initialized<S>,
        on_change: Option<ChangeCallback<S>>,
    ) -> Self {
        let reactor = Self {
            inner: Arc::new(Inner {
                lifecycle: RwLock::new(Lifecycle::Live),
                state: Mutex::new(state),
                history: init.history.map(Mutex::new),
                middlewares: MiddlewareChain::new(init.middlewares),
                plugins: Mutex::new(init.host),
                subscribers: Arc::new(SubscriberRegistry::new()),
                on_change,
                batch: Mutex::new(BatchState::default()),
                commits: AtomicUsize::new(0),
                observing: AtomicBool::new(false),
                name,
            }),
        };
        debug!(reactor = ?reactor.inner.name, "reactor live");
        reactor
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.inner.lifecycle.read()
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle() == Lifecycle::Destroyed
    }

    pub fn downgrade(&self) -> WeakReactor<S> {
        WeakReactor {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.inner.lifecycle.read().is_live() {
            Ok(())
        } else {
            Err(ReactorError::destroyed(self.name()))
        }
    }

    /// Live, and not inside a before-hook of an in-flight commit.
    fn ensure_mutable(&self) -> Result<()> {
        self.ensure_live()?;
        if self.inner.observing.load(Ordering::SeqCst) {
            return Err(ReactorError::ReentrantUpdate);
        }
        Ok(())
    }

    /// The state lock is only held while a mutator runs, so failing to take
    /// it means the caller is inside one.
    fn lock_state(&self) -> Result<MutexGuard<'_, S>> {
        self.inner
            .state
            .try_lock()
            .ok_or(ReactorError::ReentrantUpdate)
    }

    // --- Reading ---

    /// Snapshot of the live state.
    pub fn state(&self) -> Result<S> {
        self.ensure_live()?;
        Ok(self.lock_state()?.snapshot())
    }

    /// Read the live state in place.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R> {
        self.ensure_live()?;
        let live = self.lock_state()?;
        Ok(f(&live))
    }

    // --- Updating ---

    /// Mutate the live state.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut S),
    {
        self.run_update(None, f)
    }

    /// Mutate the live state, labelling the change with `action`.
    pub fn update_as<F>(&self, action: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut S),
    {
        self.run_update(Some(action), f)
    }

    fn run_update<F>(&self, action: Option<&str>, f: F) -> Result<()>
    where
        F: FnOnce(&mut S),
    {
        self.try_update(action, |state| {
            f(state);
            Ok::<(), ReactorError>(())
        })
    }

    /// Mutate the live state with a fallible mutator.
    ///
    /// An error from `f` is returned unchanged. Whatever `f` changed before
    /// failing stays in the live state: there is no rollback, and no hooks,
    /// history or notifications run for the failed call.
    pub fn try_update<F, E>(&self, action: Option<&str>, f: F) -> std::result::Result<(), E>
    where
        F: FnOnce(&mut S) -> std::result::Result<(), E>,
        E: From<ReactorError>,
    {
        self.ensure_mutable()?;
        let (prev, next) = {
            let mut live = self.lock_state()?;
            let prev = live.snapshot();
            f(&mut live)?;
            (prev, live.snapshot())
        };
        self.publish(&prev, &next, action, true);
        trace!(reactor = ?self.inner.name, ?action, "update committed");
        Ok(())
    }

    /// Run hooks, history (when `record` is set), `on_change` and
    /// notification for a change that is already in the live state.
    fn publish(&self, prev: &S, next: &S, action: Option<&str>, record: bool) {
        let scope = CommitScope::enter(&self.inner);
        let middlewares = &self.inner.middlewares;

        self.inner.observing.store(true, Ordering::SeqCst);
        middlewares.run_before(prev, next, action);
        if record {
            if let Some(history) = &self.inner.history {
                history.lock().push(prev, next, action);
            }
        }
        self.inner.observing.store(false, Ordering::SeqCst);

        // Queued before after-hooks run so nested commits line up behind it.
        self.stage(next);
        middlewares.run_after(prev, next, action);
        if let Some(on_change) = &self.inner.on_change {
            on_change(next, prev, action);
        }

        drop(scope);
        self.flush();
    }

    fn stage(&self, next: &S) {
        {
            let mut batch = self.inner.batch.lock();
            if batch.depth > 0 {
                batch.dirty = true;
                return;
            }
        }
        if !self.inner.subscribers.is_empty() {
            self.inner.subscribers.enqueue(next.snapshot());
        }
    }

    fn flush(&self) {
        if self.inner.commits.load(Ordering::SeqCst) == 0 {
            self.inner.subscribers.flush();
        }
    }

    /// Group the updates made by `f` into one history entry and one
    /// notification. Nested batches join the outermost one.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        self.ensure_mutable()?;
        let guard = self.open_batch();
        let out = f();
        guard.close();
        Ok(out)
    }

    /// Like [`batch`](Reactor::batch) for a fallible body. The batch is closed
    /// and subscribers notified of whatever changed before the error is
    /// returned.
    pub fn try_batch<R, E>(&self, f: impl FnOnce() -> std::result::Result<R, E>) -> std::result::Result<R, E>
    where
        E: From<ReactorError>,
    {
        self.ensure_mutable()?;
        let guard = self.open_batch();
        let out = f();
        guard.close();
        out
    }

    fn open_batch(&self) -> BatchGuard<'_, S> {
        let mut batch = self.inner.batch.lock();
        batch.depth += 1;
        if batch.depth == 1 {
            batch.dirty = false;
            if let Some(history) = &self.inner.history {
                history.lock().start_batch();
            }
        }
        BatchGuard {
            reactor: self,
            closed: false,
        }
    }

    fn close_batch(&self, notify: bool) {
        let dirty = {
            let mut batch = self.inner.batch.lock();
            batch.depth = batch.depth.saturating_sub(1);
            if batch.depth > 0 {
                return;
            }
            std::mem::take(&mut batch.dirty)
        };

        // A reactor destroyed mid-batch has already dropped its history.
        if !self.inner.lifecycle.read().is_live() {
            return;
        }
        if let Some(history) = &self.inner.history {
            history.lock().end_batch();
        }
        if dirty && notify {
            if let Some(live) = self.inner.state.try_lock() {
                let snapshot = live.snapshot();
                drop(live);
                self.inner.subscribers.enqueue(snapshot);
                self.flush();
            }
        }
    }

    // --- Subscribing ---

    /// Register `callback`. It is called right away with the current state,
    /// then with every committed state.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&S) + 'static,
    {
        self.ensure_live()?;
        let current = self.lock_state()?.snapshot();
        let callback: Callback<S> = Arc::new(callback);
        let id = self.inner.subscribers.add(Arc::clone(&callback));
        callback(&current);
        Ok(self.handle(id))
    }

    /// Watch a value derived from the state. `on_changed(new, prev)` runs
    /// only when the selected value changes under the configured equality.
    pub fn select<T, Sel, F>(
        &self,
        selector: Sel,
        on_changed: F,
        options: SelectOptions<T>,
    ) -> Result<Subscription>
    where
        T: Clone + PartialEq + 'static,
        Sel: Fn(&S) -> T + 'static,
        F: Fn(&T, Option<&T>) + 'static,
    {
        self.ensure_live()?;
        let current = self.lock_state()?.snapshot();

        let equality: EqualityFn<T> = match options.equality {
            Some(equality) => equality,
            None => Arc::new(|a: &T, b: &T| a == b),
        };
        let selection = Arc::new(Selection::new(
            Box::new(selector),
            Box::new(on_changed),
            equality,
        ));

        let observer = Arc::clone(&selection);
        let id = self
            .inner
            .subscribers
            .add(Arc::new(move |state: &S| observer.observe(state)));
        selection.prime(&current, options.fire_immediately);
        Ok(self.handle(id))
    }

    fn handle(&self, id: SubscriptionId) -> Subscription {
        let registry = Arc::downgrade(&self.inner.subscribers) as Weak<dyn Unsubscribe>;
        Subscription::new(id, registry)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    // --- History ---

    /// Step back one history entry. Returns false when there is no history
    /// plugin or nothing to undo.
    pub fn undo(&self) -> Result<bool> {
        self.travel(Travel::Undo)
    }

    /// Step forward one history entry. Returns false when there is no history
    /// plugin or nothing to redo.
    pub fn redo(&self) -> Result<bool> {
        self.travel(Travel::Redo)
    }

    fn travel(&self, direction: Travel) -> Result<bool> {
        self.ensure_mutable()?;
        let Some(history) = &self.inner.history else {
            return Ok(false);
        };

        let (prev, next, action) = {
            let mut live = self.lock_state()?;
            let (restored, action) = {
                let mut history = history.lock();
                match direction {
                    Travel::Undo => (history.undo(), UNDO_ACTION),
                    Travel::Redo => (history.redo(), REDO_ACTION),
                }
            };
            let Some(restored) = restored else {
                return Ok(false);
            };
            let prev = std::mem::replace(&mut *live, restored);
            (prev, live.snapshot(), action)
        };

        debug!(reactor = ?self.inner.name, action, "history travel");
        self.publish(&prev, &next, Some(action), false);
        Ok(true)
    }

    pub fn can_undo(&self) -> Result<bool> {
        self.ensure_live()?;
        Ok(self
            .inner
            .history
            .as_ref()
            .map_or(false, |h| h.lock().can_undo()))
    }

    pub fn can_redo(&self) -> Result<bool> {
        self.ensure_live()?;
        Ok(self
            .inner
            .history
            .as_ref()
            .map_or(false, |h| h.lock().can_redo()))
    }

    /// Drop all history entries, keeping the current state.
    pub fn clear_history(&self) -> Result<()> {
        self.ensure_live()?;
        if let Some(history) = &self.inner.history {
            history.lock().clear();
        }
        Ok(())
    }

    /// Detached copy of the history stacks, if a history plugin is attached.
    pub fn get_history(&self) -> Result<Option<HistorySnapshot<S>>> {
        self.ensure_live()?;
        Ok(self.inner.history.as_ref().map(|h| h.lock().get_stack()))
    }

    // --- Lifecycle ---

    /// Tear the reactor down. Clears history, drops subscribers and destroys
    /// middleware and plugins. Every later call fails with
    /// [`ReactorError::Destroyed`]. Calling `destroy` again does nothing.
    pub fn destroy(&self) {
        {
            let mut lifecycle = self.inner.lifecycle.write();
            if *lifecycle == Lifecycle::Destroyed {
                return;
            }
            *lifecycle = Lifecycle::Destroyed;
        }

        if let Some(history) = &self.inner.history {
            history.lock().clear();
        }
        self.inner.subscribers.clear();
        self.inner.middlewares.destroy_all();
        self.inner.plugins.lock().destroy_all();
        debug!(reactor = ?self.inner.name, "reactor destroyed");
    }

    /// Snapshot of everything the reactor holds.
    pub fn inspect(&self) -> Result<Inspection<S>> {
        self.ensure_live()?;
        Ok(Inspection {
            name: self.inner.name.clone(),
            lifecycle: self.lifecycle(),
            state: self.lock_state()?.snapshot(),
            history: self.inner.history.as_ref().map(|h| h.lock().get_stack()),
            middlewares: self.inner.middlewares.names(),
            plugins: self.inner.plugins.lock().names(),
            subscribers: self.inner.subscribers.len(),
        })
    }
}

impl<S: State + Merge> Reactor<S> {
    /// Shallow-merge `partial` into the state through the update pipeline.
    pub fn set(&self, partial: S::Partial) -> Result<()> {
        self.update(move |state| state.merge(partial))
    }
}

/// Counts a commit as in flight until dropped, even when `on_change` panics.
struct CommitScope<'a, S> {
    inner: &'a Inner<S>,
}

impl<'a, S> CommitScope<'a, S> {
    fn enter(inner: &'a Inner<S>) -> Self {
        inner.commits.fetch_add(1, Ordering::SeqCst);
        Self { inner }
    }
}

impl<S> Drop for CommitScope<'_, S> {
    fn drop(&mut self) {
        self.inner.observing.store(false, Ordering::SeqCst);
        self.inner.commits.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Closes a batch on every exit path. A panicking body still closes the
/// batch so history stays consistent, but subscribers are not called while
/// unwinding.
struct BatchGuard<'a, S: State> {
    reactor: &'a Reactor<S>,
    closed: bool,
}

impl<S: State> BatchGuard<'_, S> {
    fn close(mut self) {
        self.closed = true;
        self.reactor.close_batch(true);
    }
}

impl<S: State> Drop for BatchGuard<'_, S> {
    fn drop(&mut self) {
        if !self.closed {
            self.reactor.close_batch(false);
        }
    }
}

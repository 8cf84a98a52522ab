//! Undo/redo stack of state snapshots.

use crate::error::Result;
use crate::state::State;
use crate::types::{Timestamp, BATCH_ACTION};
use std::collections::VecDeque;
use tracing::{debug, trace};

use super::types::{HistoryConfig, HistoryEntry, HistorySnapshot};

/// Pushes collected while a batch is open.
struct BatchBuffer<S> {
    /// State as of just before the batch's first update.
    first: Option<S>,
    pushes: usize,
}

/// Past/future stacks of snapshots around the current state.
pub struct HistoryStack<S> {
    config: HistoryConfig,
    past: VecDeque<HistoryEntry<S>>,
    future: Vec<HistoryEntry<S>>,
    current: S,
    batch: Option<BatchBuffer<S>>,
    /// Set while consecutive excluded actions are being absorbed.
    excluded_run: bool,
}

impl<S: State> HistoryStack<S> {
    /// Create an empty stack positioned at `initial`.
    pub fn new(initial: &S, config: HistoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            past: VecDeque::with_capacity(config.limit.min(64)),
            future: Vec::new(),
            current: initial.snapshot(),
            batch: None,
            excluded_run: false,
            config,
        })
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// The state history considers current.
    pub fn current(&self) -> &S {
        &self.current
    }

    /// Reposition the stack on `state` without recording anything.
    pub fn rebase(&mut self, state: &S) {
        self.current = state.snapshot();
    }

    /// Record the transition `prev -> next`.
    pub fn push(&mut self, prev: &S, next: &S, action: Option<&str>) {
        if self.config.is_excluded(action) {
            self.push_excluded(prev, next, action);
            return;
        }
        self.excluded_run = false;

        if let Some(batch) = self.batch.as_mut() {
            if batch.first.is_none() {
                batch.first = Some(prev.snapshot());
            }
            batch.pushes += 1;
            let pushes = batch.pushes;
            self.advance(next);
            trace!(pushes, "buffered batched history push");
            return;
        }

        if self.config.group_by_action && action.is_some() {
            let last_action = self.past.back().and_then(|e| e.action.as_deref());
            if last_action == action {
                self.advance(next);
                trace!(?action, "grouped history push");
                return;
            }
        }

        if self.config.compress && next.same_as(&self.current) {
            trace!(?action, "compressed no-op history push");
            return;
        }

        self.record(prev.snapshot(), action.map(str::to_string));
        self.advance(next);
    }

    /// Excluded actions never add their own step. The first push of an
    /// excluded run saves the state just before it, unless the last entry
    /// already holds that state, so undo lands before the run.
    fn push_excluded(&mut self, prev: &S, next: &S, action: Option<&str>) {
        if !self.excluded_run {
            let covered = self
                .past
                .back()
                .map_or(false, |entry| entry.state.same_as(prev));
            // The checkpoint is untagged: it is not a step of the excluded action.
            if !covered {
                self.record(prev.snapshot(), None);
            }
            self.excluded_run = true;
        }
        self.advance(next);
        trace!(?action, "excluded history push");
    }

    fn record(&mut self, state: S, action: Option<String>) {
        self.past.push_back(HistoryEntry {
            state,
            timestamp: Timestamp::now(),
            action,
        });
        self.evict();
    }

    fn evict(&mut self) {
        while self.past.len() > self.config.limit {
            self.past.pop_front();
            debug!(limit = self.config.limit, "evicted oldest history entry");
        }
    }

    fn advance(&mut self, next: &S) {
        self.current = next.snapshot();
        self.future.clear();
    }

    /// Step back. Returns the restored state, or `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<S> {
        let entry = self.past.pop_back()?;
        self.excluded_run = false;
        let restored = entry.state.snapshot();
        let previous = std::mem::replace(&mut self.current, entry.state);
        self.future.push(HistoryEntry {
            state: previous,
            timestamp: Timestamp::now(),
            action: entry.action,
        });
        Some(restored)
    }

    /// Step forward. Returns the restored state, or `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<S> {
        let entry = self.future.pop()?;
        self.excluded_run = false;
        let restored = entry.state.snapshot();
        let previous = std::mem::replace(&mut self.current, entry.state);
        self.record(previous, entry.action);
        Some(restored)
    }

    /// Open a batch. Opening while already batching discards the open buffer.
    pub fn start_batch(&mut self) {
        if self.batch.is_some() {
            debug!("batch restarted while open; discarding buffered pushes");
        }
        self.batch = Some(BatchBuffer {
            first: None,
            pushes: 0,
        });
    }

    /// Close the batch, committing one entry if anything was buffered.
    pub fn end_batch(&mut self) {
        let Some(batch) = self.batch.take() else {
            return;
        };
        if let Some(first) = batch.first {
            self.record(first, Some(BATCH_ACTION.to_string()));
            self.future.clear();
            trace!(pushes = batch.pushes, "committed batch to history");
        }
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_some()
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    /// Drop all entries. The current state is kept.
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        if self.batch.is_some() {
            self.start_batch();
        }
        self.excluded_run = false;
    }

    /// Copy of the stacks that shares nothing with this one.
    pub fn get_stack(&self) -> HistorySnapshot<S> {
        let copy = |e: &HistoryEntry<S>| HistoryEntry {
            state: e.state.snapshot(),
            timestamp: e.timestamp,
            action: e.action.clone(),
        };
        HistorySnapshot {
            past: self.past.iter().map(copy).collect(),
            future: self.future.iter().map(copy).collect(),
            current: self.current.snapshot(),
        }
    }
}

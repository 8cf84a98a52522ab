//! History configuration and entry types.

use crate::error::{ReactorError, Result};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Configuration for a history stack.
#[derive(Clone, Debug)]
pub struct HistoryConfig {
    /// Max entries kept in the past stack; oldest are evicted first.
    /// Default: 100
    pub limit: usize,

    /// Actions that never get their own undo step.
    pub exclude_actions: Vec<String>,

    /// Skip updates whose next state equals the current one.
    pub compress: bool,

    /// Collapse consecutive updates carrying the same action into one step.
    pub group_by_action: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            exclude_actions: Vec::new(),
            compress: false,
            group_by_action: false,
        }
    }
}

impl HistoryConfig {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_excluded<I, A>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.exclude_actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_grouping(mut self, group_by_action: bool) -> Self {
        self.group_by_action = group_by_action;
        self
    }

    /// Check numeric options.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(ReactorError::InvalidOption {
                option: "history.limit",
                value: self.limit.to_string(),
                hint: "use a positive number of entries, e.g. 100",
            });
        }
        Ok(())
    }

    pub fn is_excluded(&self, action: Option<&str>) -> bool {
        match action {
            Some(action) => self.exclude_actions.iter().any(|a| a == action),
            None => false,
        }
    }
}

/// One recorded step in history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry<S> {
    /// State to restore when this entry is undone (or redone).
    pub state: S,
    pub timestamp: Timestamp,
    pub action: Option<String>,
}

/// Detached copy of a history stack, safe to keep or mutate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistorySnapshot<S> {
    /// Oldest first.
    pub past: Vec<HistoryEntry<S>>,
    /// The next redo target is last.
    pub future: Vec<HistoryEntry<S>>,
    pub current: S,
}

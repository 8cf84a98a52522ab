//! Undo/redo history.
//!
//! A [`HistoryStack`] keeps snapshots of past and undone states around the
//! current one. Pushes go through a fixed sequence of filters:
//!
//! - excluded actions never get their own undo step
//! - open batches buffer pushes and commit one entry on close
//! - consecutive pushes with the same action can be grouped
//! - no-op pushes can be compressed away
//!
//! The stack is bounded by [`HistoryConfig::limit`]; the oldest entries are
//! evicted first.

mod stack;
mod types;

pub use stack::HistoryStack;
pub use types::{HistoryConfig, HistoryEntry, HistorySnapshot};

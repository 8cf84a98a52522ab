//! Core types shared across the reactor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Action tag recorded on the history entry committed by a batch.
pub const BATCH_ACTION: &str = "batch";

/// Action passed to middleware when the reactor steps back through history.
pub const UNDO_ACTION: &str = "undo";

/// Action passed to middleware when the reactor steps forward through history.
pub const REDO_ACTION: &str = "redo";

/// Action tag for updates applied from a sync transport.
pub const SYNC_ACTION: &str = "sync";

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        // A clock before the epoch collapses to zero rather than panicking.
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a reactor is in its lifetime.
///
/// `Initializing` only lasts while plugins run `init`; a reactor handed back
/// to the caller is always `Live` until `destroy` moves it to `Destroyed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Initializing,
    Live,
    Destroyed,
}

impl Lifecycle {
    pub fn is_live(self) -> bool {
        matches!(self, Lifecycle::Live)
    }
}

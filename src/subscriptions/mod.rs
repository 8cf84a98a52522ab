//! Subscriptions to reactor state.
//!
//! Subscribers are plain callbacks receiving a snapshot of every committed
//! state. Selections layer on top of them and only report when a derived
//! value changes.
//!
//! # Example
//!
//! ```ignore
//! let reactor = Reactor::new(json!({"a": 1, "b": 1}));
//!
//! let sub = reactor.subscribe(|state| println!("state is now {state}"))?;
//!
//! let sel = reactor.select(
//!     |state| state["a"].clone(),
//!     |new, prev| println!("a: {prev:?} -> {new}"),
//!     SelectOptions::default(),
//! )?;
//!
//! sub.unsubscribe();
//! ```

mod manager;
mod select;
mod types;

pub use manager::{Callback, SubscriberRegistry};
pub(crate) use select::Selection;
pub use types::{EqualityFn, SelectOptions, Subscription};
pub(crate) use types::Unsubscribe;

//! # State Reactor
//!
//! A reactive state container with undo/redo history, middleware and plugins.
//!
//! ## Core Concepts
//!
//! - **Reactor**: owns the live state and runs every change through one pipeline
//! - **History**: bounded undo/redo stacks with batching, compression and grouping
//! - **Middleware**: before/after hooks around every update, isolated from each other
//! - **Plugins**: one-shot extensions that install history or middleware at construction
//! - **Subscriptions**: whole-state listeners and selectors over derived values
//!
//! ## Example
//!
//! ```ignore
//! use serde_json::json;
//! use state_reactor::{HistoryConfig, HistoryPlugin, Reactor, ReactorOptions};
//!
//! let reactor = Reactor::with_options(
//!     json!({"count": 0}),
//!     ReactorOptions::default()
//!         .with_name("counter")
//!         .with_plugin(HistoryPlugin::new(HistoryConfig::default().with_limit(50))),
//! )?;
//!
//! let sub = reactor.subscribe(|state| println!("count = {}", state["count"]))?;
//!
//! reactor.update_as("increment", |state| {
//!     state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
//! })?;
//!
//! reactor.undo()?;
//! sub.unsubscribe();
//! reactor.destroy();
//! ```

pub mod error;
pub mod history;
pub mod middleware;
pub mod plugins;
pub mod reactor;
pub mod state;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{ReactorError, Result};
pub use history::{HistoryConfig, HistoryEntry, HistorySnapshot, HistoryStack};
pub use middleware::{Hook, HookError, HookResult, Middleware, MiddlewareChain};
pub use plugins::{
    ChannelTransport, HistoryPlugin, LoggerConfig, LoggerPlugin, Plugin, PluginContext,
    PluginHost, SyncHub, SyncMessage, SyncPlugin, SyncReceiver, Transport,
};
pub use reactor::{ChangeCallback, Inspection, Reactor, ReactorOptions, WeakReactor};
pub use state::{deep_clone, is_equal, is_scalar, Merge, State};
pub use subscriptions::{EqualityFn, SelectOptions, Subscription};
pub use types::*;

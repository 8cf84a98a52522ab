//! Middleware hooks around every update.
//!
//! Each middleware sees the state before and after a mutation. Failures are
//! contained per middleware: see [`Middleware`] for the contract.

mod chain;
mod types;

pub use chain::MiddlewareChain;
pub use types::{Hook, HookError, HookResult, Middleware};

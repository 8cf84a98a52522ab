//! Middleware trait and hook errors.

use thiserror::Error;
use tracing::warn;

/// Error raised by a middleware hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error("{hook} hook panicked: {message}")]
    Panicked { hook: Hook, message: String },

    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for HookError {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        HookError::Other(e)
    }
}

impl HookError {
    pub fn msg(message: impl Into<String>) -> Self {
        HookError::Failed(message.into())
    }
}

/// Result type for middleware hooks.
pub type HookResult = std::result::Result<(), HookError>;

/// Which side of an update a hook runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hook {
    BeforeUpdate,
    AfterUpdate,
}

impl std::fmt::Display for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hook::BeforeUpdate => f.write_str("on_before_update"),
            Hook::AfterUpdate => f.write_str("on_after_update"),
        }
    }
}

/// Observer bracketing every update.
///
/// Hooks only observe: they get the state before and after the mutation and
/// the update's action, if any. A hook that fails or panics never affects the
/// update or the other middlewares; the error goes to this middleware's own
/// [`on_error`](Middleware::on_error).
pub trait Middleware<S> {
    fn name(&self) -> &str;

    fn on_before_update(&self, _prev: &S, _next: &S, _action: Option<&str>) -> HookResult {
        Ok(())
    }

    fn on_after_update(&self, _prev: &S, _next: &S, _action: Option<&str>) -> HookResult {
        Ok(())
    }

    /// Called with errors raised by this middleware's own hooks.
    /// The default drops the error after logging it.
    fn on_error(&self, error: &HookError) {
        warn!(middleware = self.name(), %error, "middleware hook failed");
    }

    /// Release resources when the owning reactor is destroyed.
    fn destroy(&self) {}
}

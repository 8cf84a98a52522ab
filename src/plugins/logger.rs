//! Logging plugin.

use crate::error::Result;
use crate::middleware::{HookError, HookResult, Middleware};
use crate::state::State;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{Plugin, PluginContext};

/// Logger configuration.
#[derive(Clone, Debug, Default)]
pub struct LoggerConfig {
    /// Include the before/after states in the events.
    pub log_state: bool,

    /// Only log updates that changed the state.
    pub skip_unchanged: bool,
}

/// Emits a `tracing` event around every update.
#[derive(Clone, Debug, Default)]
pub struct LoggerPlugin {
    config: LoggerConfig,
}

impl LoggerPlugin {
    pub fn new(config: LoggerConfig) -> Self {
        Self { config }
    }
}

impl<S: State + Debug> Plugin<S> for LoggerPlugin {
    fn name(&self) -> &str {
        "logger"
    }

    fn init(&mut self, ctx: &mut PluginContext<'_, S>) -> Result<()> {
        ctx.middlewares.push(Arc::new(LoggerMiddleware {
            reactor: ctx.name.unwrap_or("reactor").to_string(),
            config: self.config.clone(),
            updates: AtomicU64::new(0),
        }));
        Ok(())
    }
}

struct LoggerMiddleware {
    reactor: String,
    config: LoggerConfig,
    updates: AtomicU64,
}

impl<S: State + Debug> Middleware<S> for LoggerMiddleware {
    fn name(&self) -> &str {
        "logger"
    }

    fn on_before_update(&self, _prev: &S, _next: &S, action: Option<&str>) -> HookResult {
        debug!(reactor = %self.reactor, ?action, "update starting");
        Ok(())
    }

    fn on_after_update(&self, prev: &S, next: &S, action: Option<&str>) -> HookResult {
        let changed = !prev.same_as(next);
        if self.config.skip_unchanged && !changed {
            return Ok(());
        }

        let seq = self.updates.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.log_state {
            info!(reactor = %self.reactor, seq, ?action, changed, ?prev, ?next, "state updated");
        } else {
            info!(reactor = %self.reactor, seq, ?action, changed, "state updated");
        }
        Ok(())
    }

    fn on_error(&self, err: &HookError) {
        error!(reactor = %self.reactor, %err, "logger middleware failed");
    }
}

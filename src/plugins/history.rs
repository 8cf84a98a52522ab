//! Undo/redo plugin.

use crate::error::Result;
use crate::history::{HistoryConfig, HistoryStack};
use crate::state::State;

use super::{Plugin, PluginContext};

/// Installs a [`HistoryStack`] on the reactor.
///
/// Without this plugin the reactor's history operations are no-ops.
#[derive(Clone, Debug, Default)]
pub struct HistoryPlugin {
    config: HistoryConfig,
}

impl HistoryPlugin {
    pub fn new(config: HistoryConfig) -> Self {
        Self { config }
    }
}

impl<S: State> Plugin<S> for HistoryPlugin {
    fn name(&self) -> &str {
        "history"
    }

    fn init(&mut self, ctx: &mut PluginContext<'_, S>) -> Result<()> {
        ctx.history = Some(HistoryStack::new(&*ctx.state, self.config.clone())?);
        Ok(())
    }
}

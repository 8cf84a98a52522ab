//! Plugin host.
//!
//! Plugins run once while a reactor is being built. Each gets a
//! [`PluginContext`] through which it may edit the initial state, install a
//! history stack and register middleware. Plugins are initialized in
//! registration order and destroyed in the same order when the reactor is
//! destroyed.
//!
//! Built-in plugins:
//! - [`HistoryPlugin`]: undo/redo
//! - [`LoggerPlugin`]: `tracing` output for every update
//! - [`SyncPlugin`]: state broadcast between reactors over a [`Transport`]

mod history;
mod logger;
pub mod sync;

pub use history::HistoryPlugin;
pub use logger::{LoggerConfig, LoggerPlugin};
pub use sync::{ChannelTransport, SyncHub, SyncMessage, SyncPlugin, SyncReceiver, Transport};

use crate::error::{ReactorError, Result};
use crate::history::HistoryStack;
use crate::middleware::Middleware;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// Shared view handed to each plugin's `init`.
pub struct PluginContext<'a, S> {
    /// Live state; plugins may rewrite it (e.g. to hydrate from storage).
    pub state: &'a mut S,
    /// History installed by a plugin, if any.
    pub history: Option<HistoryStack<S>>,
    /// Middlewares in registration order; push to add one.
    pub middlewares: Vec<Arc<dyn Middleware<S>>>,
    /// Name of the reactor being built.
    pub name: Option<&'a str>,
}

/// Extension attached to a reactor at construction.
pub trait Plugin<S> {
    fn name(&self) -> &str;

    /// Called once, in registration order. An error aborts construction.
    fn init(&mut self, ctx: &mut PluginContext<'_, S>) -> Result<()>;

    /// Called once when the reactor is destroyed.
    fn destroy(&mut self) {}
}

/// Plugins owned by a reactor.
pub struct PluginHost<S> {
    plugins: Vec<Box<dyn Plugin<S>>>,
}

/// What plugin initialization produced for the reactor.
pub struct Initialized<S> {
    pub host: PluginHost<S>,
    pub history: Option<HistoryStack<S>>,
    pub middlewares: Vec<Arc<dyn Middleware<S>>>,
}

impl<S> PluginHost<S> {
    pub fn empty() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Validate and initialize `plugins` against `state`.
    pub fn initialize(
        mut plugins: Vec<Box<dyn Plugin<S>>>,
        state: &mut S,
        name: Option<&str>,
    ) -> Result<Initialized<S>> {
        for plugin in &plugins {
            validate(plugin.as_ref())?;
        }

        let mut ctx = PluginContext {
            state,
            history: None,
            middlewares: Vec::new(),
            name,
        };

        for plugin in plugins.iter_mut() {
            plugin.init(&mut ctx)?;
            debug!(plugin = plugin.name(), reactor = ?name, "plugin initialized");
        }

        Ok(Initialized {
            history: ctx.history,
            middlewares: ctx.middlewares,
            host: PluginHost { plugins },
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Destroy every plugin. One plugin panicking does not stop the rest.
    pub fn destroy_all(&mut self) {
        for plugin in self.plugins.iter_mut() {
            let name = plugin.name().to_string();
            if catch_unwind(AssertUnwindSafe(|| plugin.destroy())).is_err() {
                error!(plugin = %name, "plugin destroy panicked");
            }
        }
    }
}

fn validate<S>(plugin: &dyn Plugin<S>) -> Result<()> {
    if plugin.name().trim().is_empty() {
        return Err(ReactorError::InvalidPlugin(
            "plugin name must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryConfig;
    use crate::middleware::HookResult;
    use parking_lot::Mutex;

    struct Named(&'static str, Arc<Mutex<Vec<String>>>);

    impl Plugin<i32> for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn init(&mut self, ctx: &mut PluginContext<'_, i32>) -> Result<()> {
            *ctx.state += 1;
            self.1.lock().push(format!("init:{}:{}", self.0, ctx.state));
            Ok(())
        }

        fn destroy(&mut self) {
            self.1.lock().push(format!("destroy:{}", self.0));
        }
    }

    struct Noop;

    impl Middleware<i32> for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn on_after_update(&self, _: &i32, _: &i32, _: Option<&str>) -> HookResult {
            Ok(())
        }
    }

    struct Installer;

    impl Plugin<i32> for Installer {
        fn name(&self) -> &str {
            "installer"
        }

        fn init(&mut self, ctx: &mut PluginContext<'_, i32>) -> Result<()> {
            ctx.history = Some(HistoryStack::new(&*ctx.state, HistoryConfig::default())?);
            ctx.middlewares.push(Arc::new(Noop));
            Ok(())
        }
    }

    struct Failing;

    impl Plugin<i32> for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn init(&mut self, _ctx: &mut PluginContext<'_, i32>) -> Result<()> {
            Err(ReactorError::PluginInit {
                plugin: "failing".to_string(),
                message: "storage unavailable".to_string(),
            })
        }
    }

    #[test]
    fn test_init_and_destroy_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut state = 0;
        let plugins: Vec<Box<dyn Plugin<i32>>> = vec![
            Box::new(Named("a", Arc::clone(&log))),
            Box::new(Named("b", Arc::clone(&log))),
        ];

        let mut init = PluginHost::initialize(plugins, &mut state, Some("test")).unwrap();
        assert_eq!(state, 2);
        assert_eq!(init.host.names(), vec!["a", "b"]);

        init.host.destroy_all();
        assert_eq!(
            *log.lock(),
            vec!["init:a:1", "init:b:2", "destroy:a", "destroy:b"]
        );
    }

    #[test]
    fn test_plugin_installs_history_and_middleware() {
        let mut state = 5;
        let plugins: Vec<Box<dyn Plugin<i32>>> = vec![Box::new(Installer)];
        let init = PluginHost::initialize(plugins, &mut state, None).unwrap();
        assert!(init.history.is_some());
        assert_eq!(init.middlewares.len(), 1);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut state = 0;
        let log = Arc::new(Mutex::new(Vec::new()));
        let plugins: Vec<Box<dyn Plugin<i32>>> = vec![Box::new(Named(" ", Arc::clone(&log)))];
        let result = PluginHost::initialize(plugins, &mut state, None);
        assert!(matches!(result, Err(ReactorError::InvalidPlugin(_))));
        // Validation happens before any init runs.
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_init_error_propagates() {
        let mut state = 0;
        let plugins: Vec<Box<dyn Plugin<i32>>> = vec![Box::new(Failing)];
        let result = PluginHost::initialize(plugins, &mut state, None);
        assert!(matches!(result, Err(ReactorError::PluginInit { .. })));
    }
}

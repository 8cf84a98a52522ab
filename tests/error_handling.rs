//! Error handling and edge case tests.

use parking_lot::Mutex;
use serde_json::{json, Value};
use state_reactor::{
    HistoryConfig, HistoryPlugin, HookError, HookResult, Middleware, Plugin, PluginContext,
    Reactor, ReactorError, ReactorOptions, SyncHub, SyncPlugin,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

// --- Lifecycle Errors ---

#[test]
fn test_update_after_destroy_names_reactor() {
    let reactor = Reactor::with_options(
        json!({"count": 0}),
        ReactorOptions::default().with_name("cart"),
    )
    .unwrap();
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    reactor.subscribe(move |_: &Value| *counter.borrow_mut() += 1).unwrap();

    reactor.destroy();
    let err = reactor.update(|s| s["count"] = json!(1)).unwrap_err();

    assert!(matches!(&err, ReactorError::Destroyed { name } if name == "cart"));
    assert!(err.to_string().contains("cart"));
    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn test_every_operation_rejects_after_destroy() {
    let reactor = Reactor::with_options(
        json!({}),
        ReactorOptions::default().with_plugin(HistoryPlugin::default()),
    )
    .unwrap();
    reactor.destroy();

    assert!(reactor.state().is_err());
    assert!(reactor.subscribe(|_: &Value| {}).is_err());
    assert!(reactor.batch(|| ()).is_err());
    assert!(reactor.undo().is_err());
    assert!(reactor.redo().is_err());
    assert!(reactor.can_undo().is_err());
    assert!(reactor.get_history().is_err());
    assert!(reactor.inspect().is_err());
    assert!(reactor.set(serde_json::Map::new()).is_err());
    assert_eq!(reactor.subscriber_count(), 0);
}

#[test]
fn test_destroy_runs_plugin_and_middleware_teardown() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let reactor = Reactor::with_options(
        0i32,
        ReactorOptions::default().with_plugin(Tracked {
            log: Arc::clone(&log),
        }),
    )
    .unwrap();

    reactor.destroy();
    reactor.destroy();

    assert_eq!(*log.lock(), vec!["middleware destroyed", "plugin destroyed"]);
}

struct Tracked {
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Plugin<i32> for Tracked {
    fn name(&self) -> &str {
        "tracked"
    }

    fn init(&mut self, ctx: &mut PluginContext<'_, i32>) -> state_reactor::Result<()> {
        ctx.middlewares.push(Arc::new(TrackedMiddleware {
            log: Arc::clone(&self.log),
        }));
        Ok(())
    }

    fn destroy(&mut self) {
        self.log.lock().push("plugin destroyed");
    }
}

struct TrackedMiddleware {
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Middleware<i32> for TrackedMiddleware {
    fn name(&self) -> &str {
        "tracked"
    }

    fn destroy(&self) {
        self.log.lock().push("middleware destroyed");
    }
}

// --- Mutator Errors ---

#[derive(Debug, PartialEq)]
enum CartError {
    OutOfStock,
    Reactor(String),
}

impl From<ReactorError> for CartError {
    fn from(e: ReactorError) -> Self {
        CartError::Reactor(e.to_string())
    }
}

#[test]
fn test_mutator_error_propagates_without_rollback() {
    let reactor = Reactor::with_options(
        json!({"items": 0, "total": 0}),
        ReactorOptions::default().with_plugin(HistoryPlugin::default()),
    )
    .unwrap();
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    reactor.subscribe(move |_: &Value| *counter.borrow_mut() += 1).unwrap();

    let result = reactor.try_update(Some("add"), |s| {
        s["items"] = json!(1);
        Err(CartError::OutOfStock)
    });

    assert_eq!(result, Err(CartError::OutOfStock));
    assert_eq!(reactor.state().unwrap(), json!({"items": 1, "total": 0}));
    assert!(!reactor.can_undo().unwrap());
    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn test_try_update_on_destroyed_converts_error() {
    let reactor = Reactor::new(json!({}));
    reactor.destroy();

    let result = reactor.try_update(None, |_| Ok::<(), CartError>(()));
    assert!(matches!(result, Err(CartError::Reactor(msg)) if msg.contains("destroyed")));
}

#[test]
fn test_mutator_cannot_reenter_reactor() {
    let reactor = Reactor::new(json!({"a": 1}));
    let handle = reactor.clone();
    let mut inner = None;

    reactor
        .update(|s| {
            s["a"] = json!(2);
            inner = Some(handle.state());
        })
        .unwrap();

    assert!(matches!(inner, Some(Err(ReactorError::ReentrantUpdate))));
    assert_eq!(reactor.state().unwrap()["a"], 2);
}

// --- Middleware Isolation ---

struct Faulty {
    errors: Arc<Mutex<Vec<String>>>,
}

impl Middleware<Value> for Faulty {
    fn name(&self) -> &str {
        "faulty"
    }

    fn on_before_update(&self, _: &Value, _: &Value, _: Option<&str>) -> HookResult {
        Err(HookError::msg("before failed"))
    }

    fn on_after_update(&self, _: &Value, _: &Value, _: Option<&str>) -> HookResult {
        panic!("after exploded");
    }

    fn on_error(&self, err: &HookError) {
        self.errors.lock().push(err.to_string());
    }
}

struct Healthy {
    seen: Arc<Mutex<Vec<Option<String>>>>,
}

impl Middleware<Value> for Healthy {
    fn name(&self) -> &str {
        "healthy"
    }

    fn on_after_update(&self, _: &Value, _: &Value, action: Option<&str>) -> HookResult {
        self.seen.lock().push(action.map(str::to_string));
        Ok(())
    }
}

struct Install(Vec<Arc<dyn Middleware<Value>>>);

impl Plugin<Value> for Install {
    fn name(&self) -> &str {
        "install"
    }

    fn init(&mut self, ctx: &mut PluginContext<'_, Value>) -> state_reactor::Result<()> {
        ctx.middlewares.append(&mut self.0);
        Ok(())
    }
}

#[test]
fn test_middleware_failure_is_isolated() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let reactor = Reactor::with_options(
        json!({"n": 0}),
        ReactorOptions::default()
            .with_plugin(HistoryPlugin::default())
            .with_plugin(Install(vec![
                Arc::new(Faulty {
                    errors: Arc::clone(&errors),
                }),
                Arc::new(Healthy {
                    seen: Arc::clone(&seen),
                }),
            ])),
    )
    .unwrap();

    reactor.update_as("set", |s| s["n"] = json!(1)).unwrap();
    reactor.undo().unwrap();

    assert_eq!(reactor.state().unwrap(), json!({"n": 0}));
    assert_eq!(
        *seen.lock(),
        vec![Some("set".to_string()), Some("undo".to_string())]
    );

    let errors = errors.lock();
    assert_eq!(errors.len(), 4);
    assert!(errors[0].contains("before failed"));
    assert!(errors[1].contains("after exploded"));
}

// --- Construction Errors ---

#[test]
fn test_zero_history_limit_rejected() {
    let result = Reactor::with_options(
        json!({}),
        ReactorOptions::default().with_plugin(HistoryPlugin::new(HistoryConfig::default().with_limit(0))),
    );

    let err = result.err().unwrap();
    assert!(matches!(err, ReactorError::InvalidOption { option: "history.limit", .. }));
    assert!(err.to_string().contains("0"));
}

struct Broken;

impl Plugin<Value> for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn init(&mut self, _ctx: &mut PluginContext<'_, Value>) -> state_reactor::Result<()> {
        Err(ReactorError::PluginInit {
            plugin: "broken".to_string(),
            message: "backing store unavailable".to_string(),
        })
    }
}

#[test]
fn test_plugin_init_failure_aborts_construction() {
    let result = Reactor::with_options(
        json!({}),
        ReactorOptions::default()
            .with_plugin(HistoryPlugin::default())
            .with_plugin(Broken),
    );

    assert!(matches!(result, Err(ReactorError::PluginInit { plugin, .. }) if plugin == "broken"));
}

struct Nameless;

impl Plugin<Value> for Nameless {
    fn name(&self) -> &str {
        ""
    }

    fn init(&mut self, _ctx: &mut PluginContext<'_, Value>) -> state_reactor::Result<()> {
        Ok(())
    }
}

#[test]
fn test_nameless_plugin_rejected() {
    let result = Reactor::with_options(json!({}), ReactorOptions::default().with_plugin(Nameless));
    assert!(matches!(result, Err(ReactorError::InvalidPlugin(_))));
}

#[test]
fn test_empty_sync_channel_rejected() {
    let hub = SyncHub::new();
    let result = Reactor::with_options(
        json!({}),
        ReactorOptions::default().with_plugin(SyncPlugin::new("", Arc::new(hub.endpoint()))),
    );
    assert!(matches!(
        result,
        Err(ReactorError::InvalidOption { option: "sync.channel", .. })
    ));
}

// --- Edge Cases ---

#[test]
fn test_undo_redo_on_empty_history() {
    let reactor = Reactor::with_options(
        json!({"n": 0}),
        ReactorOptions::default().with_plugin(HistoryPlugin::default()),
    )
    .unwrap();

    assert!(!reactor.undo().unwrap());
    assert!(!reactor.redo().unwrap());
    assert_eq!(reactor.state().unwrap(), json!({"n": 0}));
}

#[test]
fn test_unsubscribe_after_reactor_dropped() {
    let reactor = Reactor::new(json!({}));
    let sub = reactor.subscribe(|_: &Value| {}).unwrap();
    drop(reactor);
    assert!(!sub.unsubscribe());
}

//! Ordered dispatch of middleware hooks.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, trace};

use super::types::{Hook, HookError, HookResult, Middleware};

/// Middlewares in registration order.
pub struct MiddlewareChain<S> {
    middlewares: Vec<Arc<dyn Middleware<S>>>,
}

impl<S> MiddlewareChain<S> {
    pub fn new(middlewares: Vec<Arc<dyn Middleware<S>>>) -> Self {
        Self { middlewares }
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.middlewares.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn run_before(&self, prev: &S, next: &S, action: Option<&str>) {
        self.run(Hook::BeforeUpdate, prev, next, action);
    }

    pub fn run_after(&self, prev: &S, next: &S, action: Option<&str>) {
        self.run(Hook::AfterUpdate, prev, next, action);
    }

    fn run(&self, hook: Hook, prev: &S, next: &S, action: Option<&str>) {
        if self.middlewares.is_empty() {
            return;
        }

        for middleware in &self.middlewares {
            let outcome: std::thread::Result<HookResult> =
                catch_unwind(AssertUnwindSafe(|| match hook {
                    Hook::BeforeUpdate => middleware.on_before_update(prev, next, action),
                    Hook::AfterUpdate => middleware.on_after_update(prev, next, action),
                }));

            let err = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(payload) => HookError::Panicked {
                    hook,
                    message: panic_message(payload.as_ref()),
                },
            };

            trace!(middleware = middleware.name(), %hook, "routing hook error");
            report(middleware.as_ref(), &err);
        }
    }

    /// Call `destroy` on every middleware, in registration order.
    pub fn destroy_all(&self) {
        for middleware in &self.middlewares {
            if catch_unwind(AssertUnwindSafe(|| middleware.destroy())).is_err() {
                error!(middleware = middleware.name(), "middleware destroy panicked");
            }
        }
    }
}

/// Hand an error to the middleware that raised it. A panicking `on_error` is
/// logged and otherwise ignored.
fn report<S>(middleware: &dyn Middleware<S>, err: &HookError) {
    if catch_unwind(AssertUnwindSafe(|| middleware.on_error(err))).is_err() {
        error!(middleware = middleware.name(), %err, "middleware on_error panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records every hook call and error into a shared log.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_before: bool,
        panic_after: bool,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                fail_before: false,
                panic_after: false,
            }
        }
    }

    impl Middleware<i32> for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn on_before_update(&self, prev: &i32, next: &i32, _action: Option<&str>) -> HookResult {
            self.log.lock().push(format!("{}:before:{}->{}", self.name, prev, next));
            if self.fail_before {
                return Err(HookError::msg("boom"));
            }
            Ok(())
        }

        fn on_after_update(&self, _prev: &i32, _next: &i32, action: Option<&str>) -> HookResult {
            if self.panic_after {
                panic!("after exploded");
            }
            self.log
                .lock()
                .push(format!("{}:after:{}", self.name, action.unwrap_or("-")));
            Ok(())
        }

        fn on_error(&self, error: &HookError) {
            self.log.lock().push(format!("{}:error:{}", self.name, error));
        }
    }

    /// Uses the default `on_error`.
    struct Silent;

    impl Middleware<i32> for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        fn on_before_update(&self, _: &i32, _: &i32, _: Option<&str>) -> HookResult {
            Err(HookError::msg("ignored"))
        }
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: MiddlewareChain<i32> = MiddlewareChain::new(vec![
            Arc::new(Recorder::new("a", &log)),
            Arc::new(Recorder::new("b", &log)),
        ]);

        chain.run_before(&1, &2, Some("inc"));
        chain.run_after(&1, &2, Some("inc"));

        assert_eq!(
            *log.lock(),
            vec!["a:before:1->2", "b:before:1->2", "a:after:inc", "b:after:inc"]
        );
    }

    #[test]
    fn test_error_goes_only_to_owner() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = Recorder::new("a", &log);
        failing.fail_before = true;
        let chain: MiddlewareChain<i32> =
            MiddlewareChain::new(vec![Arc::new(failing), Arc::new(Recorder::new("b", &log))]);

        chain.run_before(&0, &1, None);

        assert_eq!(
            *log.lock(),
            vec!["a:before:0->1", "a:error:boom", "b:before:0->1"]
        );
    }

    #[test]
    fn test_panic_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut panicking = Recorder::new("a", &log);
        panicking.panic_after = true;
        let chain: MiddlewareChain<i32> =
            MiddlewareChain::new(vec![Arc::new(panicking), Arc::new(Recorder::new("b", &log))]);

        chain.run_after(&0, &1, None);

        let log = log.lock();
        assert_eq!(log.len(), 2);
        assert!(log[0].starts_with("a:error:on_after_update hook panicked: after exploded"));
        assert_eq!(log[1], "b:after:-");
    }

    #[test]
    fn test_default_on_error_swallows() {
        let chain: MiddlewareChain<i32> = MiddlewareChain::new(vec![Arc::new(Silent)]);
        chain.run_before(&0, &1, None);
        chain.run_after(&0, &1, None);
        assert_eq!(chain.names(), vec!["silent"]);
    }

    #[test]
    fn test_empty_chain() {
        let chain: MiddlewareChain<i32> = MiddlewareChain::new(Vec::new());
        assert!(chain.is_empty());
        chain.run_before(&0, &1, None);
        chain.destroy_all();
    }
}

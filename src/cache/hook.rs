use std::collections::HashMap;
use std::sync::RwLock;

/// Observation context threaded through a hook chain invocation.
///
/// `before` handlers may stash arbitrary values here for their own `after`
/// to pick back up; the chain itself never inspects the contents.
#[derive(Debug, Default, Clone)]
pub struct HookContext {
    values: HashMap<String, String>,
}

impl HookContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// A single pre/post observer.
///
/// `before` must be a pure observational transform: it may enrich the
/// context but must not fail. If a handler needs to signal failure it has
/// to do so through the underlying operation's own error channel — the
/// chain itself has no error path.
pub trait HookHandler: Send + Sync {
    fn before(&self, ctx: HookContext, op: &str) -> HookContext {
        let _ = op;
        ctx
    }

    fn after(&self, ctx: &HookContext, op: &str) {
        let _ = (ctx, op);
    }
}

/// An ordered, append-only sequence of hook handlers wrapping every public
/// cache operation.
///
/// Registration uses a `RwLock` rather than requiring `&mut self` because
/// every real owner of a `HookChain` (the tiered cache) is shared via `Arc`
/// once running, and hooks must stay registerable against that shared
/// handle.
#[derive(Default)]
pub struct HookChain {
    handlers: RwLock<Vec<Box<dyn HookHandler>>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handler: Box<dyn HookHandler>) {
        self.handlers.write().unwrap().push(handler);
    }

    /// Runs `before` for every handler in registration order, then `op`,
    /// then `after` in the same order, and returns `op`'s result.
    pub fn run<T>(&self, op_name: &str, op: impl FnOnce() -> T) -> T {
        let mut ctx = HookContext::new();
        {
            let handlers = self.handlers.read().unwrap();
            for handler in handlers.iter() {
                ctx = handler.before(ctx, op_name);
            }
        }

        let result = op();

        {
            let handlers = self.handlers.read().unwrap();
            for handler in handlers.iter() {
                handler.after(&ctx, op_name);
            }
        }

        result
    }

    /// Async counterpart of `run`, used by tiered-cache operations that may
    /// suspend on L2 I/O. The handler list lock is never held across the
    /// `.await`.
    pub async fn run_async<T, Fut>(&self, op_name: &str, op: impl FnOnce() -> Fut) -> T
    where
        Fut: std::future::Future<Output = T>,
    {
        let mut ctx = HookContext::new();
        {
            let handlers = self.handlers.read().unwrap();
            for handler in handlers.iter() {
                ctx = handler.before(ctx, op_name);
            }
        }

        let result = op().await;

        {
            let handlers = self.handlers.read().unwrap();
            for handler in handlers.iter() {
                handler.after(&ctx, op_name);
            }
        }

        result
    }
}

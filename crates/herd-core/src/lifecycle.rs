use std::{
    fmt,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::{future::BoxFuture, FutureExt};

type Hook = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct Hooks {
    fired: bool,
    hooks: Vec<(String, Hook)>,
}

/// Teardown actions to run when the host process terminates.
///
/// Clones share the same list. [`ShutdownHooks::run`] executes every hook
/// once, in registration order; later calls, and hooks registered after the
/// first run, are ignored.
#[derive(Clone, Default)]
pub struct ShutdownHooks {
    inner: Arc<Mutex<Hooks>>,
}

impl fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("ShutdownHooks")
            .field("fired", &inner.fired)
            .field(
                "hooks",
                &inner.hooks.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ShutdownHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Hooks> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register<F, Fut>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let mut inner = self.lock();
        if inner.fired {
            tracing::warn!("Shutdown already in progress, ignoring hook `{name}`");
            return;
        }
        tracing::debug!("Registered shutdown hook `{name}`");
        inner.hooks.push((name, Box::new(move || hook().boxed())));
    }

    /// Run all registered hooks. Only the first call does anything.
    pub async fn run(&self) {
        let hooks = {
            let mut inner = self.lock();
            if inner.fired {
                return;
            }
            inner.fired = true;
            std::mem::take(&mut inner.hooks)
        };

        for (name, hook) in hooks {
            tracing::info!("Running shutdown hook `{name}`");
            hook().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_hooks_run_exactly_once_in_order() {
        let hooks = ShutdownHooks::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let calls = calls.clone();
            hooks.register(name, move || async move {
                calls.lock().unwrap().push(name);
            });
        }

        hooks.clone().run().await;
        hooks.run().await;

        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_hooks_registered_after_run_are_ignored() {
        let hooks = ShutdownHooks::new();
        let count = Arc::new(AtomicUsize::new(0));
        hooks.run().await;

        let counter = count.clone();
        hooks.register("late", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        hooks.run().await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

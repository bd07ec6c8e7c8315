//! Index change notifications.
//!
//! A minimal in-process bus for invalidating external caches. Handlers run
//! synchronously on the emitting task; a panicking handler is isolated and
//! logged, never propagated to the writer.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::RwLock;

/// Emitted after every index mutation.
#[derive(Clone, Debug)]
pub struct IndexChanged {
    pub repo: String,
}

type Handler = Box<dyn Fn(&IndexChanged) + Send + Sync>;

/// Subscription registry for [`IndexChanged`] events.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<Vec<Handler>>,
}

impl EventBus {
    /// Register a handler for index changes.
    pub fn on<F>(&self, handler: F)
    where
        F: Fn(&IndexChanged) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .expect("event bus lock poisoned")
            .push(Box::new(handler));
    }

    /// Fire-and-forget emit. Handler panics are caught and logged.
    pub fn emit(&self, event: IndexChanged) {
        let handlers = self.handlers.read().expect("event bus lock poisoned");
        for handler in handlers.iter() {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                tracing::warn!(repo = %event.repo, "index change handler panicked");
            }
        }
    }
}

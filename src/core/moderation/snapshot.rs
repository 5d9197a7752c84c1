// Swap-on-reload holder for immutable shared state.
//
// Readers clone the inner `Arc` and work on that copy for the rest of their
// operation, so a concurrent `replace` can never hand them a half-built value.

use std::sync::{Arc, PoisonError, RwLock};

pub struct Snapshot<T> {
    current: RwLock<Arc<T>>,
}

impl<T> Snapshot<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    /// The value active right now. Cheap: one refcount bump.
    pub fn load(&self) -> Arc<T> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Publish a fully built replacement.
    pub fn replace(&self, value: T) {
        let next = Arc::new(value);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }
}

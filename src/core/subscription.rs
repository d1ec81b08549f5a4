//! Observer registries and the idempotent handles returned to subscribers.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, Callback<T>)>>,
}

impl<T> Registry<T> {
    fn remove(&self, id: u64) {
        self.callbacks.lock().retain(|(entry, _)| *entry != id);
    }
}

/// A set of callbacks notified with `&T`.
///
/// Callbacks are invoked outside the registry lock, so a callback may
/// subscribe or unsubscribe without deadlocking.
pub struct Observers<T> {
    registry: Arc<Registry<T>>,
}

impl<T: 'static> Observers<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register `callback`, invoking it immediately with `current`.
    pub fn subscribe<F>(&self, current: &T, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .callbacks
            .lock()
            .push((id, Arc::clone(&callback)));
        callback(current);

        let weak: Weak<Registry<T>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                registry.remove(id);
            }
        })
    }

    /// Invoke every registered callback with `value`.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .registry
            .callbacks
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.registry.callbacks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every callback. Outstanding handles become no-ops.
    pub fn clear(&self) {
        self.registry.callbacks.lock().clear();
    }
}

impl<T: 'static> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by every `subscribe`-style call.
///
/// `unsubscribe` is idempotent. Dropping the handle does not unsubscribe.
pub struct Subscription {
    cancel: Option<Box<dyn Fn() + Send + Sync>>,
    done: AtomicBool,
}

impl Subscription {
    pub(crate) fn new<F>(cancel: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
            done: AtomicBool::new(false),
        }
    }

    /// A handle with nothing to cancel, returned when there was nothing to subscribe to.
    pub fn inert() -> Self {
        Self {
            cancel: None,
            done: AtomicBool::new(true),
        }
    }

    pub fn unsubscribe(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(cancel) = &self.cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        !self.done.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

//! Change notification boundary between the media index and its viewers.
//!
//! The index calls [`ChangeNotifier::notify_changed`] after it commits a
//! mutation. Mutations grouped under [`ChangeNotifier::batch`] are delivered
//! as a single notification when the outermost guard drops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

/// Receives a callback whenever the observed index changed.
pub trait IndexObserver: Send + Sync {
    fn on_index_changed(&self);
}

impl<F> IndexObserver for F
where
    F: Fn() + Send + Sync,
{
    fn on_index_changed(&self) {
        self()
    }
}

#[derive(Default)]
struct BatchState {
    depth: usize,
    dirty: bool,
}

#[derive(Default)]
struct NotifierInner {
    observers: RwLock<Vec<(u64, Arc<dyn IndexObserver>)>>,
    next_id: AtomicU64,
    batch: Mutex<BatchState>,
}

impl NotifierInner {
    fn deliver(&self) {
        // Snapshot the list so observers may (un)register from inside the callback.
        let observers: Vec<Arc<dyn IndexObserver>> =
            self.observers.read().iter().map(|(_, o)| Arc::clone(o)).collect();
        trace!(observers = observers.len(), "Delivering index change");
        for observer in observers {
            observer.on_index_changed();
        }
    }
}

/// Registry of [`IndexObserver`]s for one index.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `observer` until the returned [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unregisters the observer"]
    pub fn register(&self, observer: Arc<dyn IndexObserver>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.write().push((id, observer));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.read().len()
    }

    /// Signals a change, or marks the open batch dirty.
    pub fn notify_changed(&self) {
        {
            let mut batch = self.inner.batch.lock();
            if batch.depth > 0 {
                batch.dirty = true;
                return;
            }
        }
        self.inner.deliver();
    }

    /// Coalesces notifications until the returned guard (and any outer ones) drop.
    pub fn batch(&self) -> BatchGuard {
        self.inner.batch.lock().depth += 1;
        BatchGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Keeps an observer registered.
pub struct Subscription {
    id: u64,
    inner: Weak<NotifierInner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.observers.write().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Open notification batch, see [`ChangeNotifier::batch`].
pub struct BatchGuard {
    inner: Arc<NotifierInner>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let fire = {
            let mut batch = self.inner.batch.lock();
            batch.depth -= 1;
            batch.depth == 0 && std::mem::take(&mut batch.dirty)
        };
        if fire {
            self.inner.deliver();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter(notifier: &ChangeNotifier) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = notifier.register(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        (count, sub)
    }

    #[test]
    fn test_notify_reaches_observer() {
        let notifier = ChangeNotifier::new();
        let (count, _sub) = counter(&notifier);

        notifier.notify_changed();
        notifier.notify_changed();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_batch_coalesces() {
        let notifier = ChangeNotifier::new();
        let (count, _sub) = counter(&notifier);

        {
            let _outer = notifier.batch();
            notifier.notify_changed();
            {
                let _inner = notifier.batch();
                notifier.notify_changed();
            }
            assert_eq!(count.load(Ordering::SeqCst), 0);
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clean_batch_is_silent() {
        let notifier = ChangeNotifier::new();
        let (count, _sub) = counter(&notifier);

        drop(notifier.batch());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dropped_subscription_unregisters() {
        let notifier = ChangeNotifier::new();
        let (count, sub) = counter(&notifier);
        assert_eq!(notifier.observer_count(), 1);

        drop(sub);
        notifier.notify_changed();
        assert_eq!(notifier.observer_count(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

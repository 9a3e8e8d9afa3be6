//! Observer sets shared by attributes and components

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Change callback
pub type Observer = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by `add_observer`, used to remove the observer again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
pub(crate) struct ObserverSet {
    next_id: AtomicU64,
    observers: RwLock<Vec<(ObserverId, Observer)>>,
}

impl ObserverSet {
    pub(crate) fn add(&self, observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    pub(crate) fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Invoke every observer in registration order. The lock is released
    /// before any callback runs.
    pub(crate) fn call(&self) {
        let snapshot: Vec<Observer> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in snapshot {
            observer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn add_call_remove() {
        let set = ObserverSet::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let id = set.add(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        set.call();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(set.remove(id));
        assert!(!set.remove(id));
        set.call();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(set.observers.read().is_empty());
    }
}

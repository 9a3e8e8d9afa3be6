//! Per-layer identity map
//!
//! At most one live instance per `(component type, id)` within a layer.
//! Loads and saves of the same identity are serialized by an async per-key
//! lock so concurrent `get`s resolve to the same instance.

use crate::errors::{StorableError, StorableResult};
use component_runtime::Component;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Identity of a storable component within a layer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub component: String,
    pub id: String,
}

impl IdentityKey {
    pub fn new(component: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.component, self.id)
    }
}

type KeyLocks = DashMap<IdentityKey, Arc<Mutex<()>>>;

pub struct IdentityMap {
    entries: DashMap<IdentityKey, Component>,
    locks: Arc<KeyLocks>,
    release_idle_locks: bool,
}

impl IdentityMap {
    pub fn new(release_idle_locks: bool) -> Self {
        Self {
            entries: DashMap::new(),
            locks: Arc::new(DashMap::new()),
            release_idle_locks,
        }
    }

    pub fn get(&self, key: &IdentityKey) -> Option<Component> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered instance for `key`, registering `create()` when absent
    pub fn get_or_insert_with(
        &self,
        key: IdentityKey,
        create: impl FnOnce() -> Component,
    ) -> Component {
        self.entries.entry(key).or_insert_with(create).value().clone()
    }

    /// Register `component` under `key`. Re-registering the same instance is
    /// a no-op; a different instance is a conflict.
    pub fn register(&self, key: IdentityKey, component: &Component) -> StorableResult<()> {
        let entry = self.entries.entry(key).or_insert_with(|| component.clone());
        if entry.value().ptr_eq(component) {
            Ok(())
        } else {
            Err(StorableError::IdentityConflict {
                component: entry.key().component.clone(),
                id: entry.key().id.clone(),
            })
        }
    }

    pub fn remove(&self, key: &IdentityKey) -> Option<Component> {
        self.entries.remove(key).map(|(_, component)| component)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<IdentityKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &IdentityKey) -> KeyGuard {
        let mutex = self.locks.entry(key.clone()).or_default().value().clone();
        let guard = mutex.lock_owned().await;
        trace!(key = %key, "identity lock acquired");
        KeyGuard {
            guard: Some(guard),
            key: key.clone(),
            locks: self.release_idle_locks.then(|| Arc::clone(&self.locks)),
        }
    }

    /// Number of per-key locks currently allocated
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }
}

impl Default for IdentityMap {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Exclusive access to one identity; the lock entry is dropped with the last
/// guard when idle locks are released
pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: IdentityKey,
    locks: Option<Arc<KeyLocks>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        if let Some(locks) = &self.locks {
            // Only the map's own handle left: nobody holds or awaits it
            locks.remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

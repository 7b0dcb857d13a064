//! Keyed mutual exclusion.
//!
//! At most one scoring computation may run for a (tenant, job) pair at a
//! time, whether it comes from first-time ingestion or a sync cycle. The same
//! registry keyed by tenant alone serializes persona save-and-sign. Entries
//! are dropped from the registry once nobody holds or waits on them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type Registry<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

pub struct KeyedLocks<K> {
    registry: Registry<K>,
}

/// One scoring computation per (tenant, job).
pub type PairLocks = KeyedLocks<(Uuid, String)>;

/// One persona write per tenant.
pub type TenantLocks = KeyedLocks<Uuid>;

/// Holds the lock for one key until dropped.
pub struct KeyGuard<K: Eq + Hash> {
    guard: Option<OwnedMutexGuard<()>>,
    key: K,
    registry: Registry<K>,
}

impl<K> Clone for KeyedLocks<K> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: K) -> KeyGuard<K> {
        let mutex = {
            let mut map = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(key.clone()).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        KeyGuard {
            guard: Some(guard),
            key,
            registry: self.registry.clone(),
        }
    }

    /// Number of live keys.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PairLocks {
    pub async fn lock_pair(&self, tenant: Uuid, job_id: &str) -> KeyGuard<(Uuid, String)> {
        self.lock((tenant, job_id.to_string())).await
    }
}

impl<K: Eq + Hash> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the registry's own Arc left: no holder, no waiter.
        if map
            .get(&self.key)
            .is_some_and(|m| Arc::strong_count(m) == 1)
        {
            map.remove(&self.key);
        }
    }
}

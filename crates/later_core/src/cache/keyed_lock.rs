//! Per-key async mutual exclusion.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const CLEANUP_INTERVAL: usize = 32;
const CLEANUP_THRESHOLD: usize = 64;

/// Lock map that serializes work on the same key.
///
/// Entries are held weakly and dropped once no guard references them, so
/// the map does not grow with every key ever locked.
pub struct KeyedLock<K> {
    locks: Mutex<HashMap<K, Weak<AsyncMutex<()>>>>,
    acquisitions: AtomicUsize,
}

impl<K> KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            acquisitions: AtomicUsize::new(0),
        }
    }

    /// Waits until `key` is free and returns a guard holding it.
    ///
    /// Waiters on one key are served in FIFO order.
    pub async fn acquire(&self, key: K) -> KeyedGuard<K> {
        let mutex = {
            let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            let mutex = map.get(&key).and_then(Weak::upgrade).unwrap_or_else(|| {
                let fresh = Arc::new(AsyncMutex::new(()));
                map.insert(key.clone(), Arc::downgrade(&fresh));
                fresh
            });

            let tick = self.acquisitions.fetch_add(1, Ordering::Relaxed);
            if map.len() > CLEANUP_THRESHOLD && tick % CLEANUP_INTERVAL == 0 {
                map.retain(|_, weak| weak.strong_count() > 0);
            }
            mutex
        };

        KeyedGuard {
            key,
            _guard: mutex.lock_owned().await,
        }
    }

    /// Number of keys currently tracked, including not yet purged ones.
    pub fn tracked_keys(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<K> Default for KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Holds one key of a `KeyedLock` until dropped.
pub struct KeyedGuard<K> {
    key: K,
    _guard: OwnedMutexGuard<()>,
}

impl<K> KeyedGuard<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

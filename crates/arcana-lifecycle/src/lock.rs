//! Per-key async mutual exclusion.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slots<K> = Arc<DashMap<K, Arc<Mutex<()>>>>;

/// A map of independent async mutexes, one per key.
///
/// The guard is owned, so it can be held across awaits and is released on
/// every exit path, including when the holding future is dropped. Distinct
/// keys never contend. A key's slot lives only while someone holds or waits
/// on it.
#[derive(Debug)]
pub struct KeyedLock<K: Eq + Hash> {
    slots: Slots<K>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLock<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> KeyedLock<K> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    pub async fn lock(&self, key: &K) -> KeyedGuard<K> {
        // clone the Arc out so the shard lock is not held across the await
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = slot.lock_owned().await;
        KeyedGuard {
            slots: self.slots.clone(),
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Holds one key of a [`KeyedLock`].
pub struct KeyedGuard<K: Eq + Hash> {
    slots: Slots<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        // Release first, so the guard's own handle on the slot is gone.
        self.guard.take();
        // Waiters and new lockers clone the slot under the shard lock, so a
        // count of one means only the map refers to it.
        self.slots.remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

impl<K: Eq + Hash + std::fmt::Debug> std::fmt::Debug for KeyedGuard<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedGuard").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_serializes() {
        let lock = Arc::new(KeyedLock::<String>::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let (lock, active, peak) = (lock.clone(), active.clone(), peak.clone());
            tasks.push(tokio::spawn(async move {
                let _g = lock.lock(&"c".to_string()).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(lock.is_empty());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block() {
        let lock = KeyedLock::<String>::new();
        let _a = lock.lock(&"a".to_string()).await;
        let b = tokio::time::timeout(Duration::from_millis(50), lock.lock(&"b".to_string())).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn dropped_waiter_releases_nothing_it_did_not_hold() {
        let lock = Arc::new(KeyedLock::<String>::new());
        let held = lock.lock(&"a".to_string()).await;
        let waiter = tokio::time::timeout(Duration::from_millis(10), lock.lock(&"a".to_string())).await;
        assert!(waiter.is_err());
        drop(held);
        let again = tokio::time::timeout(Duration::from_millis(50), lock.lock(&"a".to_string())).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn slots_are_evicted_when_released() {
        let lock = KeyedLock::<String>::new();
        for i in 0..100 {
            let _g = lock.lock(&format!("ghost-{i}")).await;
        }
        assert!(lock.is_empty());

        let held = lock.lock(&"a".to_string()).await;
        assert_eq!(lock.len(), 1);
        drop(held);
        assert_eq!(lock.len(), 0);
    }

    #[tokio::test]
    async fn slot_survives_while_a_waiter_is_queued() {
        let lock = Arc::new(KeyedLock::<String>::new());
        let held = lock.lock(&"a".to_string()).await;
        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move {
                let _g = lock.lock(&"a".to_string()).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        drop(held);
        assert_eq!(lock.len(), 1, "queued waiter keeps the slot");
        waiter.await.unwrap();
        assert!(lock.is_empty());
    }
}

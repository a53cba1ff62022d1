//! Per-key serialization of flushes.
//!
//! Two flushes for the same `(owner, world, category)` must not both run
//! their match query before either has written, or both would insert.
//! Each key gets an async mutex slot while any flush for it is pending;
//! idle slots are dropped so the map only holds in-flight keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use locus_types::RecordKey;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Map of in-flight keys to their serialization slot.
#[derive(Debug, Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<RecordKey, Arc<AsyncMutex<()>>>>,
}

/// Exclusive hold on one key. Releases (and possibly frees) the slot on drop.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: RecordKey,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyLocks {
    /// Create an empty lock map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other flush holds `key`, then hold it.
    pub async fn acquire(&self, key: &RecordKey) -> KeyGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        let guard = Arc::clone(&slot).lock_owned().await;
        KeyGuard {
            locks: self,
            key: key.clone(),
            slot,
            guard: Some(guard),
        }
    }

    /// Number of keys with a pending or running flush.
    pub fn in_flight(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self
            .locks
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map and this guard reference the slot: nobody is waiting.
        if Arc::strong_count(&self.slot) <= 2 {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use locus_types::{LocationCategory, OwnerId};

    use super::*;

    fn key(world: &str) -> RecordKey {
        RecordKey {
            owner: OwnerId::new(),
            world: world.to_owned(),
            category: LocationCategory::PlayerLocation,
        }
    }

    #[tokio::test]
    async fn slot_is_freed_after_release() {
        let locks = KeyLocks::new();
        let k = key("world");
        {
            let _held = locks.acquire(&k).await;
            assert_eq!(locks.in_flight(), 1);
        }
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.acquire(&key("a")).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&key("b"))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn same_key_waits_for_holder() {
        let locks = Arc::new(KeyLocks::new());
        let k = key("world");
        let held = locks.acquire(&k).await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&k)).await;
        assert!(blocked.is_err());

        drop(held);
        let acquired = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&k)).await;
        assert!(acquired.is_ok());
    }
}

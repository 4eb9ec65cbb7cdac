//! In-process advisory locks keyed by identity value

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guards held for the lifetime of one transaction
pub type KeyGuards = Vec<OwnedMutexGuard<()>>;

/// One async mutex per lock key
///
/// Keys are always acquired in sorted order, so two holders of overlapping
/// key sets cannot deadlock. Entries nobody holds or waits on are pruned on
/// the next acquisition.
#[derive(Clone, Default)]
pub struct KeyLocks {
    table: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for every key in `keys`; dropping the guards releases them
    pub async fn acquire(&self, keys: &[String]) -> KeyGuards {
        let mut sorted: Vec<&String> = keys.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut table = self.table.lock().await;
            table.retain(|_, m| Arc::strong_count(m) > 1);
            sorted
                .into_iter()
                .map(|key| table.entry(key.clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        guards
    }

    /// Number of keys currently tracked
    pub async fn tracked(&self) -> usize {
        self.table.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_disjoint_keys_do_not_wait() {
        let locks = KeyLocks::new();
        let _alice = locks.acquire(&keys(&["email:alice@x"])).await;

        let bob = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&keys(&["email:bob@x", "phone:222"])),
        )
        .await;
        assert!(bob.is_ok());
    }

    #[tokio::test]
    async fn test_shared_key_waits_until_release() {
        let locks = KeyLocks::new();
        let held = locks.acquire(&keys(&["email:a@x", "phone:111"])).await;

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&keys(&["phone:111"])),
        )
        .await;
        assert!(blocked.is_err());

        drop(held);
        let after = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&keys(&["phone:111"])),
        )
        .await;
        assert!(after.is_ok());
    }

    #[tokio::test]
    async fn test_released_keys_are_pruned() {
        let locks = KeyLocks::new();
        drop(locks.acquire(&keys(&["email:a@x"])).await);
        drop(locks.acquire(&keys(&["email:b@x"])).await);

        // Only the held key remains
        let _c = locks.acquire(&keys(&["email:c@x"])).await;
        assert_eq!(locks.tracked().await, 1);
    }
}

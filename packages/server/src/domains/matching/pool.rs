//! In-memory waiting pool, ordered by entry time.
//!
//! The pool is a cache of who is waiting; the state store stays
//! authoritative. Every batch taken out of the pool is revalidated against
//! the store before use, and the garbage collector evicts entries whose
//! store record disappeared or stopped being WAITING.

use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use crate::kernel::state_store::BaseStateStore;

/// Sort key: entry time in epoch milliseconds, tie-broken by insertion order.
type PoolKey = (i64, u64);

#[derive(Default)]
struct PoolInner {
    by_time: BTreeMap<PoolKey, String>,
    index: HashMap<String, PoolKey>,
    seq: u64,
}

#[derive(Default)]
pub struct WaitingPool {
    inner: Mutex<PoolInner>,
}

impl WaitingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user at the given entry time. Re-enqueueing an already queued
    /// user is a no-op; their original position is kept.
    pub async fn enqueue(&self, user_id: &str, entry_millis: i64) {
        let mut inner = self.inner.lock().await;
        if inner.index.contains_key(user_id) {
            return;
        }
        inner.seq += 1;
        let key = (entry_millis, inner.seq);
        inner.by_time.insert(key, user_id.to_string());
        inner.index.insert(user_id.to_string(), key);
    }

    /// Remove a user. Returns whether they were queued.
    pub async fn remove(&self, user_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.index.remove(user_id) {
            Some(key) => {
                inner.by_time.remove(&key);
                true
            }
            None => false,
        }
    }

    pub async fn contains(&self, user_id: &str) -> bool {
        self.inner.lock().await.index.contains_key(user_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.by_time.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The `n` longest-waiting user ids, oldest first. Entries stay queued.
    pub async fn oldest(&self, n: usize) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.by_time.values().take(n).cloned().collect()
    }

    /// Every queued user id, oldest first.
    pub async fn snapshot_all(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.by_time.values().cloned().collect()
    }

    /// Pop up to `max` of the oldest entries and return only those whose
    /// store record is still WAITING. Stale entries are dropped for good;
    /// valid ones must be re-enqueued by the caller once processed.
    pub async fn dequeue_batch(
        &self,
        max: usize,
        store: &dyn BaseStateStore,
    ) -> Vec<String> {
        let popped: Vec<String> = {
            let mut inner = self.inner.lock().await;
            let keys: Vec<PoolKey> = inner.by_time.keys().take(max).copied().collect();
            keys.iter()
                .filter_map(|key| {
                    let user_id = inner.by_time.remove(key)?;
                    inner.index.remove(&user_id);
                    Some(user_id)
                })
                .collect()
        };

        // Validation happens outside the lock; a stale entry is simply dropped.
        let mut valid = Vec::with_capacity(popped.len());
        for user_id in popped {
            match store.get_user(&user_id).await {
                Ok(Some(record)) if record.is_waiting() => valid.push(user_id),
                _ => {}
            }
        }
        valid
    }

    /// Evict entries whose store record is missing or no longer WAITING.
    ///
    /// The entry's key is captured before the store read and the entry is
    /// only removed if its key is unchanged, so a user who legitimately
    /// re-enters while we look them up is not evicted. Returns the number of
    /// evicted entries.
    pub async fn collect_garbage(&self, store: &dyn BaseStateStore) -> usize {
        let snapshot: Vec<(String, PoolKey)> = {
            let inner = self.inner.lock().await;
            inner
                .index
                .iter()
                .map(|(user_id, key)| (user_id.clone(), *key))
                .collect()
        };

        let mut evicted = 0;
        for (user_id, key) in snapshot {
            let stale = match store.get_user(&user_id).await {
                Ok(Some(record)) => !record.is_waiting(),
                Ok(None) => true,
                // Store read failed; leave the entry for the next pass.
                Err(_) => false,
            };
            if !stale {
                continue;
            }
            let mut inner = self.inner.lock().await;
            if inner.index.get(&user_id) == Some(&key) {
                inner.index.remove(&user_id);
                inner.by_time.remove(&key);
                evicted += 1;
            }
        }
        evicted
    }
}

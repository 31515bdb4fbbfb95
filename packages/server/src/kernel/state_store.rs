//! Shared state store for user and match records.
//!
//! The store is the single source of truth for matching state. Keys follow
//! the `user:{userId}` / `match:{matchId}` convention and user records carry
//! a TTL so abandoned sessions age out on their own.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domains::matching::models::{MatchId, MatchRecord, UserMatchRecord};

/// Default lifetime of a user record. Refreshed on every write.
pub const USER_RECORD_TTL: Duration = Duration::from_secs(30 * 60);

#[async_trait]
pub trait BaseStateStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserMatchRecord>>;
    async fn put_user(&self, record: &UserMatchRecord) -> Result<()>;
    async fn delete_user(&self, user_id: &str) -> Result<()>;

    async fn get_match(&self, match_id: &MatchId) -> Result<Option<MatchRecord>>;
    async fn put_match(&self, record: &MatchRecord) -> Result<()>;
    async fn delete_match(&self, match_id: &MatchId) -> Result<()>;
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// In-process TTL key/value store.
///
/// Expired entries are treated as absent on read and dropped lazily; there is
/// no background reaper, the pool garbage collector drives cleanup.
#[derive(Default)]
pub struct InMemoryStateStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn user_key(user_id: &str) -> String {
        format!("user:{user_id}")
    }

    fn match_key(match_id: &MatchId) -> String {
        format!("match:{match_id}")
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Entry was present but expired; drop it under the write lock.
        let mut entries = self.entries.write().await;
        if entries.get(key).map(|e| e.is_expired(now)).unwrap_or(false) {
            entries.remove(key);
        }
        None
    }

    async fn put_raw(&self, key: String, value: String, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .await
            .insert(key, Entry { value, expires_at });
    }

    async fn delete_raw(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Number of live entries. Test helper.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BaseStateStore for InMemoryStateStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserMatchRecord>> {
        match self.get_raw(&Self::user_key(user_id)).await {
            Some(raw) => {
                let record = serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt user record for {user_id}"))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn put_user(&self, record: &UserMatchRecord) -> Result<()> {
        let raw = serde_json::to_string(record).context("serialize user record")?;
        self.put_raw(Self::user_key(&record.user_id), raw, Some(USER_RECORD_TTL))
            .await;
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.delete_raw(&Self::user_key(user_id)).await;
        Ok(())
    }

    async fn get_match(&self, match_id: &MatchId) -> Result<Option<MatchRecord>> {
        match self.get_raw(&Self::match_key(match_id)).await {
            Some(raw) => {
                let record = serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt match record for {match_id}"))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn put_match(&self, record: &MatchRecord) -> Result<()> {
        let raw = serde_json::to_string(record).context("serialize match record")?;
        self.put_raw(Self::match_key(&record.match_id), raw, None)
            .await;
        Ok(())
    }

    async fn delete_match(&self, match_id: &MatchId) -> Result<()> {
        self.delete_raw(&Self::match_key(match_id)).await;
        Ok(())
    }
}

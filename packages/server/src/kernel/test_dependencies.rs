//! Mock implementations of the infrastructure traits.
//!
//! These let domain tests script external behavior (scores per pair, forced
//! failures) and inspect what the domain asked of each dependency, without
//! real network calls.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use super::traits::{
    BaseChatService, BaseSimilarityService, BaseUserDirectory, ChatRoom, PresenceStatus,
    UserProfile,
};

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Scriptable similarity service.
///
/// Scores are keyed by unordered sentence pair; unkeyed pairs get the default
/// score. `fail_times` makes the next N calls error, for retry tests.
pub struct MockSimilarityService {
    default_score: f64,
    pair_scores: RwLock<HashMap<(String, String), f64>>,
    fail_times: AtomicUsize,
    calls: AtomicUsize,
}

impl MockSimilarityService {
    pub fn new(default_score: f64) -> Self {
        Self {
            default_score,
            pair_scores: RwLock::new(HashMap::new()),
            fail_times: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_pair_score(&self, sentence1: &str, sentence2: &str, score: f64) {
        self.pair_scores
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(pair_key(sentence1, sentence2), score);
    }

    /// Make the next `n` calls fail before succeeding again.
    pub fn fail_next(&self, n: usize) {
        self.fail_times.store(n, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseSimilarityService for MockSimilarityService {
    async fn calculate_similarity(&self, sentence1: &str, sentence2: &str) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_times.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("scripted similarity failure"));
        }

        let score = self
            .pair_scores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&pair_key(sentence1, sentence2))
            .copied()
            .unwrap_or(self.default_score);
        Ok(score)
    }
}

/// A recorded chat room creation request.
#[derive(Debug, Clone)]
pub struct CreatedRoom {
    pub user_id_1: String,
    pub user_id_2: String,
    pub similarity_score: f64,
}

/// Chat service mock that mints deterministic rooms, or fails on demand.
#[derive(Default)]
pub struct MockChatService {
    created: RwLock<Vec<CreatedRoom>>,
    fail_times: AtomicUsize,
}

impl MockChatService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_times.store(n, Ordering::SeqCst);
    }

    pub fn created_rooms(&self) -> Vec<CreatedRoom> {
        self.created
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl BaseChatService for MockChatService {
    async fn create_chat_room(
        &self,
        user_id_1: &str,
        user_id_2: &str,
        _concern_1: &str,
        _concern_2: &str,
        similarity_score: f64,
    ) -> Result<ChatRoom> {
        let remaining = self.fail_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_times.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("scripted chat failure"));
        }

        let count = {
            let mut created = self.created.write().unwrap_or_else(|e| e.into_inner());
            created.push(CreatedRoom {
                user_id_1: user_id_1.to_string(),
                user_id_2: user_id_2.to_string(),
                similarity_score,
            });
            created.len()
        };

        Ok(ChatRoom {
            chat_room_id: format!("room-{count}"),
            session_id: format!("session-{count}"),
            token_a: format!("token-{user_id_1}"),
            token_b: format!("token-{user_id_2}"),
        })
    }
}

/// User directory mock with scripted profiles and recorded presence updates.
#[derive(Default)]
pub struct MockUserDirectory {
    profiles: RwLock<HashMap<String, UserProfile>>,
    presence: RwLock<Vec<(String, PresenceStatus)>>,
}

impl MockUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_profile(&self, user_id: &str, profile: UserProfile) {
        self.profiles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.to_string(), profile);
    }

    pub fn presence_updates(&self) -> Vec<(String, PresenceStatus)> {
        self.presence
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last_presence_of(&self, user_id: &str) -> Option<PresenceStatus> {
        self.presence
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|(id, _)| id == user_id)
            .map(|(_, status)| *status)
    }
}

#[async_trait]
impl BaseUserDirectory for MockUserDirectory {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self
            .profiles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned())
    }

    async fn set_presence(&self, user_id: &str, status: PresenceStatus) -> Result<()> {
        self.presence
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((user_id.to_string(), status));
        Ok(())
    }
}

// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (candidate selection, scoring, the proposal state machine)
// lives in domain code that consumes these traits.
//
// Naming convention: Base* for trait names (e.g., BaseSimilarityService)

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::common::Mbti;

// =============================================================================
// Similarity Service Trait (Infrastructure - external scoring model)
// =============================================================================

#[async_trait]
pub trait BaseSimilarityService: Send + Sync {
    /// Score how similar two free-text concerns are, in [0.0, 1.0].
    async fn calculate_similarity(&self, sentence1: &str, sentence2: &str) -> Result<f64>;
}

// =============================================================================
// Chat Service Trait (Infrastructure - room provisioning)
// =============================================================================

/// A provisioned chat room for a matched pair.
///
/// Token assignment follows the order of the user ids the room was
/// requested with: `token_a` belongs to the first user, `token_b` to the
/// second.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub chat_room_id: String,
    pub session_id: String,
    pub token_a: String,
    pub token_b: String,
}

#[async_trait]
pub trait BaseChatService: Send + Sync {
    /// Create a chat room for two matched users.
    async fn create_chat_room(
        &self,
        user_id_1: &str,
        user_id_2: &str,
        concern_1: &str,
        concern_2: &str,
        similarity_score: f64,
    ) -> Result<ChatRoom>;
}

// =============================================================================
// User Directory Trait (Infrastructure - profile lookup / presence)
// =============================================================================

/// Profile fields served by the user directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub mbti: Option<Mbti>,
    pub energy_level: Option<i32>,
    pub role: Option<String>,
    pub planet_id: Option<i64>,
}

/// Coarse presence propagated to the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Idle,
    Matching,
    Chatting,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Idle => "IDLE",
            PresenceStatus::Matching => "MATCHING",
            PresenceStatus::Chatting => "CHATTING",
        }
    }
}

#[async_trait]
pub trait BaseUserDirectory: Send + Sync {
    /// Fetch a user's profile. `Ok(None)` means the directory has no such user.
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Report the user's presence. Best-effort from the caller's perspective.
    async fn set_presence(&self, user_id: &str, status: PresenceStatus) -> Result<()>;
}

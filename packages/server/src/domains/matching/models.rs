//! Matching domain records.
//!
//! `UserMatchRecord` and `MatchRecord` live in the shared state store, which
//! is the single source of truth for a user's status. The in-memory waiting
//! pool is only a cache over WAITING records and is always revalidated against
//! these before acting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::common::Mbti;

/// Identifier of a proposed match, generated at proposal time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(Uuid);

impl MatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for MatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Where a user currently sits in the matching lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Waiting,
    Matched,
    /// Reserved for an atomic claim step; unused in the committed design.
    InProgress,
}

/// One record per user currently engaged with the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMatchRecord {
    pub user_id: String,
    pub concern: String,
    /// The user's own type, fetched from the user directory at join time.
    pub mbti: Option<Mbti>,
    pub preferred_mbti: Option<Mbti>,
    pub status: MatchStatus,
    pub match_id: Option<MatchId>,
    /// Only meaningful while status is MATCHED; cleared on every reset.
    pub accepted: bool,
    /// Entry time of the current waiting/matched phase; the pool sort key.
    pub start_time: DateTime<Utc>,
    /// Opaque pass-through bag from the join request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<serde_json::Value>,
}

impl UserMatchRecord {
    pub fn new_waiting(
        user_id: String,
        concern: String,
        mbti: Option<Mbti>,
        preferred_mbti: Option<Mbti>,
        additional_info: Option<serde_json::Value>,
    ) -> Self {
        Self {
            user_id,
            concern,
            mbti,
            preferred_mbti,
            status: MatchStatus::Waiting,
            match_id: None,
            accepted: false,
            start_time: Utc::now(),
            additional_info,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.status == MatchStatus::Waiting
    }

    /// Clear all proposal state and restart the waiting phase.
    pub fn reset_to_waiting(&mut self) {
        self.status = MatchStatus::Waiting;
        self.match_id = None;
        self.accepted = false;
        self.start_time = Utc::now();
    }

    /// Transition into a freshly proposed match.
    pub fn mark_matched(&mut self, match_id: MatchId) {
        self.status = MatchStatus::Matched;
        self.match_id = Some(match_id);
        self.accepted = false;
    }
}

/// One record per proposed match, deleted when the match resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub match_id: MatchId,
    /// Ordered pair; token assignment on chat creation follows this order.
    pub user_ids: [String; 2],
    /// Rounded before persisting; the value clients see.
    pub similarity_score: f64,
}

impl MatchRecord {
    pub fn new(match_id: MatchId, user_a: String, user_b: String, similarity_score: f64) -> Self {
        Self {
            match_id,
            user_ids: [user_a, user_b],
            similarity_score: round_score(similarity_score),
        }
    }

    /// The other member of the pair, if `user_id` is part of it.
    pub fn counterpart_of(&self, user_id: &str) -> Option<&str> {
        match &self.user_ids {
            [a, b] if a == user_id => Some(b),
            [a, b] if b == user_id => Some(a),
            _ => None,
        }
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.user_ids.iter().any(|id| id == user_id)
    }
}

/// Round a combined score to two decimals for persistence and notification.
pub fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

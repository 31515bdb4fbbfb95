//! Events pushed to clients over the notifier.
//!
//! Per-user events go to the user's own subject; `NewUser` / `ExitUser` are
//! pool-churn broadcasts on the global subject. The serialized form carries a
//! SCREAMING_SNAKE_CASE `type` tag that clients switch on.

use serde::Serialize;

use crate::common::Mbti;
use crate::domains::matching::models::MatchId;

/// Public profile fields of the counterpart, sent with a match proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartProfile {
    pub user_id: String,
    pub concern: String,
    pub mbti: Option<Mbti>,
    pub energy_level: Option<i32>,
    pub role: Option<String>,
    pub planet_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum MatchEvent {
    /// Join acknowledged; the user is now waiting.
    Waiting,
    /// A user entered (or re-entered) the waiting pool. Broadcast.
    NewUser {
        user_id: String,
        concern: String,
        mbti: Option<Mbti>,
    },
    /// A user left the waiting pool. Broadcast.
    ExitUser { user_id: String },
    /// A match was proposed; the client must accept or reject within the window.
    MatchSuccess {
        match_id: MatchId,
        counterpart: CounterpartProfile,
        similarity: f64,
    },
    /// The counterpart rejected, or the commit failed; the user is waiting again.
    MatchFailed,
    /// The accept window elapsed without both sides accepting.
    CancelMatched,
    /// Both sides accepted and the chat room is ready.
    ChatCreated {
        chat_room_id: String,
        session_id: String,
        token: String,
    },
    /// The user has waited past the timeout threshold with no match.
    TimeoutOptions {
        options: Vec<String>,
        waited_seconds: i64,
    },
    /// Timeout choice `wait` acknowledged.
    WaitingExtended,
    /// Timeout choice `relax` acknowledged; preference filter dropped.
    CriteriaRelaxed,
    /// Timeout choice `next` acknowledged; the user left this session.
    NextSession,
}

impl MatchEvent {
    pub fn timeout_options(waited_seconds: i64) -> Self {
        MatchEvent::TimeoutOptions {
            options: vec!["WAIT".to_string(), "RELAX".to_string(), "NEXT".to_string()],
            waited_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_screaming_type_tag() {
        let json = serde_json::to_value(&MatchEvent::Waiting).unwrap();
        assert_eq!(json["type"], "WAITING");

        let json = serde_json::to_value(&MatchEvent::ExitUser {
            user_id: "u1".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "EXIT_USER");
        assert_eq!(json["userId"], "u1");
    }

    #[test]
    fn match_success_carries_counterpart_and_score() {
        let event = MatchEvent::MatchSuccess {
            match_id: MatchId::new(),
            counterpart: CounterpartProfile {
                user_id: "u2".into(),
                concern: "lonely".into(),
                mbti: Some(Mbti::Infp),
                energy_level: Some(3),
                role: None,
                planet_id: None,
            },
            similarity: 0.9,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "MATCH_SUCCESS");
        assert_eq!(json["counterpart"]["userId"], "u2");
        assert_eq!(json["counterpart"]["mbti"], "INFP");
        assert_eq!(json["similarity"], 0.9);
    }
}

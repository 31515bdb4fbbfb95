//! Candidate scoring.
//!
//! The external similarity service gives the base score; a flat bonus is
//! added when either side's MBTI preference matches the other's type. All
//! candidates are scored concurrently and the best one above the threshold
//! wins. A candidate whose similarity call keeps failing scores 0.0 rather
//! than poisoning the whole pass.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::MatchTuning;
use crate::domains::matching::models::UserMatchRecord;
use crate::kernel::traits::BaseSimilarityService;

/// A scored candidate, with the combined score already clamped and bonused.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub record: UserMatchRecord,
    pub score: f64,
}

pub struct Scorer {
    similarity: Arc<dyn BaseSimilarityService>,
    tuning: MatchTuning,
}

impl Scorer {
    pub fn new(similarity: Arc<dyn BaseSimilarityService>, tuning: MatchTuning) -> Self {
        Self { similarity, tuning }
    }

    /// The threshold a combined score must meet in the given mode.
    pub fn threshold(&self, relaxed: bool) -> f64 {
        if relaxed {
            self.tuning.similarity_threshold * self.tuning.relaxed_multiplier
        } else {
            self.tuning.similarity_threshold
        }
    }

    /// Score every candidate concurrently and return the best one whose
    /// combined score meets the threshold.
    pub async fn best_candidate(
        &self,
        base: &UserMatchRecord,
        candidates: Vec<UserMatchRecord>,
        relaxed: bool,
    ) -> Option<ScoredCandidate> {
        let threshold = self.threshold(relaxed);

        let scored = join_all(candidates.into_iter().map(|candidate| async move {
            let score = self.combined_score(base, &candidate).await;
            ScoredCandidate {
                record: candidate,
                score,
            }
        }))
        .await;

        // Candidates arrive oldest first; on a score tie the earlier
        // (longer-waiting) candidate keeps the slot.
        scored
            .into_iter()
            .filter(|c| c.score >= threshold)
            .fold(None::<ScoredCandidate>, |best, c| match best {
                Some(b) if c.score > b.score => Some(c),
                Some(b) => Some(b),
                None => Some(c),
            })
    }

    /// Similarity plus MBTI bonus. The similarity part is clamped to [0, 1]
    /// before the bonus, so a bonused score can exceed 1.0.
    pub async fn combined_score(&self, base: &UserMatchRecord, candidate: &UserMatchRecord) -> f64 {
        let similarity = self
            .similarity_with_retry(&base.concern, &candidate.concern)
            .await;
        similarity + self.mbti_bonus(base, candidate)
    }

    fn mbti_bonus(&self, base: &UserMatchRecord, candidate: &UserMatchRecord) -> f64 {
        let preferred_matches = |preferred: Option<crate::common::Mbti>,
                                 other: Option<crate::common::Mbti>| {
            matches!((preferred, other), (Some(p), Some(o)) if p == o)
        };
        if preferred_matches(base.preferred_mbti, candidate.mbti)
            || preferred_matches(candidate.preferred_mbti, base.mbti)
        {
            self.tuning.mbti_bonus
        } else {
            0.0
        }
    }

    /// Call the similarity service with a fixed backoff between attempts.
    /// Exhausted retries score 0.0.
    async fn similarity_with_retry(&self, sentence1: &str, sentence2: &str) -> f64 {
        let attempts = self.tuning.similarity_retries.max(1);
        for attempt in 1..=attempts {
            match self.similarity.calculate_similarity(sentence1, sentence2).await {
                Ok(score) => return score.clamp(0.0, 1.0),
                Err(error) => {
                    warn!(attempt, %error, "similarity call failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.backoff()).await;
                    }
                }
            }
        }
        0.0
    }

    fn backoff(&self) -> Duration {
        self.tuning.similarity_retry_backoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Mbti;
    use crate::kernel::test_dependencies::MockSimilarityService;

    fn user(user_id: &str, mbti: Option<Mbti>, preferred: Option<Mbti>) -> UserMatchRecord {
        UserMatchRecord::new_waiting(
            user_id.to_string(),
            format!("concern {user_id}"),
            mbti,
            preferred,
            None,
        )
    }

    fn scorer_with(sim: Arc<MockSimilarityService>, tuning: MatchTuning) -> Scorer {
        Scorer::new(sim, tuning)
    }

    #[tokio::test]
    async fn bonus_applies_when_either_preference_matches() {
        let sim = Arc::new(MockSimilarityService::new(0.5));
        let scorer = scorer_with(sim, MatchTuning::default());

        let base = user("base", Some(Mbti::Entp), Some(Mbti::Infp));
        let liked = user("liked", Some(Mbti::Infp), None);
        let likes_back = user("likes-back", Some(Mbti::Estj), Some(Mbti::Entp));
        let neither = user("neither", Some(Mbti::Estj), Some(Mbti::Isfj));

        assert_eq!(scorer.combined_score(&base, &liked).await, 0.8);
        assert_eq!(scorer.combined_score(&base, &likes_back).await, 0.8);
        assert_eq!(scorer.combined_score(&base, &neither).await, 0.5);
    }

    #[tokio::test]
    async fn similarity_is_clamped_before_bonus() {
        let sim = Arc::new(MockSimilarityService::new(1.7));
        let scorer = scorer_with(sim, MatchTuning::default());

        let base = user("base", Some(Mbti::Entp), Some(Mbti::Infp));
        let candidate = user("c", Some(Mbti::Infp), None);

        assert_eq!(scorer.combined_score(&base, &candidate).await, 1.3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_falls_back_to_zero() {
        let sim = Arc::new(MockSimilarityService::new(0.9));
        sim.fail_next(3);
        let scorer = scorer_with(sim.clone(), MatchTuning::default());

        let base = user("base", None, None);
        let candidate = user("c", None, None);

        assert_eq!(scorer.combined_score(&base, &candidate).await, 0.0);
        assert_eq!(sim.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_on_retry() {
        let sim = Arc::new(MockSimilarityService::new(0.9));
        sim.fail_next(1);
        let scorer = scorer_with(sim.clone(), MatchTuning::default());

        let base = user("base", None, None);
        let candidate = user("c", None, None);

        assert_eq!(scorer.combined_score(&base, &candidate).await, 0.9);
        assert_eq!(sim.call_count(), 2);
    }

    #[tokio::test]
    async fn best_candidate_honors_threshold_boundary() {
        let sim = Arc::new(MockSimilarityService::new(0.0));
        sim.set_pair_score("concern base", "concern at", 0.7);
        sim.set_pair_score("concern base", "concern under", 0.69);
        let scorer = scorer_with(sim, MatchTuning::default());

        let base = user("base", None, None);
        let at = user("at", None, None);
        let under = user("under", None, None);

        let best = scorer
            .best_candidate(&base, vec![under.clone(), at.clone()], false)
            .await
            .unwrap();
        assert_eq!(best.record.user_id, "at");

        let none = scorer.best_candidate(&base, vec![under], false).await;
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn relaxed_mode_lowers_the_threshold() {
        let sim = Arc::new(MockSimilarityService::new(0.6));
        let scorer = scorer_with(sim, MatchTuning::default());

        let base = user("base", None, None);
        let candidate = user("c", None, None);

        assert!(scorer
            .best_candidate(&base, vec![candidate.clone()], false)
            .await
            .is_none());
        assert!(scorer
            .best_candidate(&base, vec![candidate], true)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn picks_the_highest_scoring_candidate() {
        let sim = Arc::new(MockSimilarityService::new(0.0));
        sim.set_pair_score("concern base", "concern good", 0.8);
        sim.set_pair_score("concern base", "concern best", 0.95);
        let scorer = scorer_with(sim, MatchTuning::default());

        let base = user("base", None, None);
        let good = user("good", None, None);
        let best = user("best", None, None);

        let winner = scorer
            .best_candidate(&base, vec![good, best], false)
            .await
            .unwrap();
        assert_eq!(winner.record.user_id, "best");
        assert_eq!(winner.score, 0.95);
    }

    #[tokio::test]
    async fn ties_go_to_the_longest_waiting_candidate() {
        let sim = Arc::new(MockSimilarityService::new(0.8));
        let scorer = scorer_with(sim, MatchTuning::default());

        let base = user("base", None, None);
        let first = user("first", None, None);
        let second = user("second", None, None);

        let winner = scorer
            .best_candidate(&base, vec![first, second], false)
            .await
            .unwrap();
        assert_eq!(winner.record.user_id, "first");
    }
}

//! Proposal lifecycle: propose, accept/reject, commit, timeout.
//!
//! A proposal holds both users in MATCHED with a shared `MatchRecord`. The
//! record is deleted only as the final store mutation of whichever transition
//! resolves the match, so timers and late responders can use its absence as
//! the "already resolved" signal instead of racing over shared flags.

use std::sync::Arc;
use tracing::{info, warn};

use crate::common::{MatchError, MatchResult};
use crate::config::MatchTuning;
use crate::domains::matching::events::{CounterpartProfile, MatchEvent};
use crate::domains::matching::models::{MatchId, MatchRecord, UserMatchRecord};
use crate::domains::matching::pool::WaitingPool;
use crate::domains::matching::scorer::Scorer;
use crate::domains::matching::selector::select_candidates;
use crate::kernel::deps::MatchDeps;
use crate::kernel::traits::PresenceStatus;

pub struct MatchOrchestrator {
    deps: MatchDeps,
    pool: Arc<WaitingPool>,
    scorer: Scorer,
    tuning: MatchTuning,
}

impl MatchOrchestrator {
    pub fn new(deps: MatchDeps, pool: Arc<WaitingPool>, tuning: MatchTuning) -> Self {
        let scorer = Scorer::new(deps.similarity.clone(), tuning.clone());
        Self {
            deps,
            pool,
            scorer,
            tuning,
        }
    }

    /// Try to find and propose a match for `user_id`. Returns whether a
    /// proposal was made.
    pub async fn run_proposal_cycle(
        self: Arc<Self>,
        user_id: &str,
        relaxed: bool,
    ) -> MatchResult<bool> {
        let base = match self.deps.store.get_user(user_id).await? {
            Some(record) if record.is_waiting() => record,
            _ => return Ok(false),
        };

        let candidates = select_candidates(
            &base,
            &self.pool,
            self.deps.store.as_ref(),
            &self.tuning,
            relaxed,
        )
        .await?;
        if candidates.is_empty() {
            return Ok(false);
        }

        let best = match self.scorer.best_candidate(&base, candidates, relaxed).await {
            Some(best) => best,
            None => return Ok(false),
        };

        self.propose(base, best.record, best.score).await
    }

    /// Move both users into MATCHED and start the proposal timers.
    ///
    /// Both records are re-read first; scoring ran without a lock, so either
    /// side may have been claimed by a concurrent cycle in the meantime.
    async fn propose(
        self: Arc<Self>,
        base: UserMatchRecord,
        candidate: UserMatchRecord,
        score: f64,
    ) -> MatchResult<bool> {
        let mut base = match self.deps.store.get_user(&base.user_id).await? {
            Some(record) if record.is_waiting() => record,
            _ => return Ok(false),
        };
        let mut candidate = match self.deps.store.get_user(&candidate.user_id).await? {
            Some(record) if record.is_waiting() => record,
            _ => return Ok(false),
        };

        let match_id = MatchId::new();
        base.mark_matched(match_id);
        candidate.mark_matched(match_id);

        self.deps.store.put_user(&base).await?;
        if let Err(error) = self.deps.store.put_user(&candidate).await {
            self.unwind_proposal(base).await;
            return Err(MatchError::Internal(error));
        }

        let record = MatchRecord::new(
            match_id,
            base.user_id.clone(),
            candidate.user_id.clone(),
            score,
        );
        if let Err(error) = self.deps.store.put_match(&record).await {
            // Neither user may stay MATCHED without a live MatchRecord.
            self.unwind_proposal(base).await;
            self.unwind_proposal(candidate).await;
            return Err(MatchError::Internal(error));
        }

        // Out of the pool before anyone hears about it, so a sweep cannot
        // hand either user out again.
        self.pool.remove(&base.user_id).await;
        self.pool.remove(&candidate.user_id).await;

        for user_id in [&base.user_id, &candidate.user_id] {
            self.broadcast(&MatchEvent::ExitUser {
                user_id: user_id.clone(),
            })
            .await;
            if let Err(error) = self
                .deps
                .directory
                .set_presence(user_id, PresenceStatus::Matching)
                .await
            {
                warn!(%user_id, %error, "presence update failed");
            }
        }

        info!(%match_id, user_a = %base.user_id, user_b = %candidate.user_id, score, "match proposed");

        let this = Arc::clone(&self);
        tokio::spawn(async move {
            tokio::time::sleep(this.tuning.proposal_notify_delay).await;
            this.deliver_proposal(match_id).await;
        });

        let this = Arc::clone(&self);
        tokio::spawn(async move {
            tokio::time::sleep(this.tuning.accept_window).await;
            if let Err(error) = this.handle_timeout(match_id).await {
                warn!(%match_id, %error, "proposal timeout handling failed");
            }
        });

        Ok(true)
    }

    /// Send MATCH_SUCCESS to both sides, after the notify delay.
    ///
    /// Skipped entirely if the match resolved while the delay ran.
    async fn deliver_proposal(&self, match_id: MatchId) {
        let record = match self.deps.store.get_match(&match_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(error) => {
                warn!(%match_id, %error, "match lookup failed before notify");
                return;
            }
        };

        for user_id in &record.user_ids {
            let Some(counterpart_id) = record.counterpart_of(user_id) else {
                continue;
            };
            let counterpart = match self.deps.store.get_user(counterpart_id).await {
                Ok(Some(counterpart)) => counterpart,
                _ => continue,
            };
            let event = MatchEvent::MatchSuccess {
                match_id,
                counterpart: self.counterpart_profile(&counterpart).await,
                similarity: record.similarity_score,
            };
            self.notify(user_id, &event).await;
        }
    }

    /// Profile enrichment is best-effort; the record's own fields are the
    /// floor.
    async fn counterpart_profile(&self, counterpart: &UserMatchRecord) -> CounterpartProfile {
        let mut profile = CounterpartProfile {
            user_id: counterpart.user_id.clone(),
            concern: counterpart.concern.clone(),
            mbti: counterpart.mbti,
            ..Default::default()
        };
        match self.deps.directory.get_profile(&counterpart.user_id).await {
            Ok(Some(directory)) => {
                profile.mbti = directory.mbti.or(profile.mbti);
                profile.energy_level = directory.energy_level;
                profile.role = directory.role;
                profile.planet_id = directory.planet_id;
            }
            Ok(None) => {}
            Err(error) => {
                warn!(user_id = %counterpart.user_id, %error, "profile enrichment failed");
            }
        }
        profile
    }

    /// Record one side's accept/reject decision.
    ///
    /// Safe to call repeatedly; a response for an already resolved match is
    /// a no-op.
    pub async fn respond(
        &self,
        match_id: MatchId,
        user_id: &str,
        accepted: bool,
    ) -> MatchResult<()> {
        let record = match self.deps.store.get_match(&match_id).await? {
            Some(record) => record,
            None => return Ok(()),
        };
        if !record.contains(user_id) {
            return Err(MatchError::InvalidRequest(format!(
                "user {user_id} is not part of match {match_id}"
            )));
        }

        if !accepted {
            return self.reject(record, user_id).await;
        }

        let mut responder = match self.deps.store.get_user(user_id).await? {
            Some(responder) if responder.match_id == Some(match_id) => responder,
            // Stale response; the user has already moved on.
            _ => return Ok(()),
        };
        if !responder.accepted {
            responder.accepted = true;
            self.deps.store.put_user(&responder).await?;
        }

        let counterpart_accepted = match record.counterpart_of(user_id) {
            Some(counterpart_id) => self
                .deps
                .store
                .get_user(counterpart_id)
                .await?
                .map(|c| c.match_id == Some(match_id) && c.accepted)
                .unwrap_or(false),
            None => false,
        };
        if counterpart_accepted {
            self.commit(record).await?;
        }
        Ok(())
    }

    /// Both sides accepted: provision the chat room and close out the match.
    async fn commit(&self, record: MatchRecord) -> MatchResult<()> {
        let [user_a, user_b] = &record.user_ids;
        let record_a = self.require_user(user_a).await?;
        let record_b = self.require_user(user_b).await?;

        let room = match self
            .deps
            .chat
            .create_chat_room(
                user_a,
                user_b,
                &record_a.concern,
                &record_b.concern,
                record.similarity_score,
            )
            .await
        {
            Ok(room) => room,
            Err(error) => {
                // Room creation failed; put both users back in line.
                self.return_to_waiting(record_a).await;
                self.return_to_waiting(record_b).await;
                self.notify(user_a, &MatchEvent::MatchFailed).await;
                self.notify(user_b, &MatchEvent::MatchFailed).await;
                self.deps.store.delete_match(&record.match_id).await?;
                return Err(MatchError::External(
                    error.context("chat room creation failed"),
                ));
            }
        };

        for user_id in [user_a, user_b] {
            if let Err(error) = self
                .deps
                .directory
                .set_presence(user_id, PresenceStatus::Chatting)
                .await
            {
                warn!(%user_id, %error, "presence update failed");
            }
        }

        self.notify(
            user_a,
            &MatchEvent::ChatCreated {
                chat_room_id: room.chat_room_id.clone(),
                session_id: room.session_id.clone(),
                token: room.token_a,
            },
        )
        .await;
        self.notify(
            user_b,
            &MatchEvent::ChatCreated {
                chat_room_id: room.chat_room_id,
                session_id: room.session_id,
                token: room.token_b,
            },
        )
        .await;

        info!(match_id = %record.match_id, %user_a, %user_b, "match committed");

        self.deps.store.delete_user(user_a).await?;
        self.deps.store.delete_user(user_b).await?;
        self.deps.store.delete_match(&record.match_id).await?;
        Ok(())
    }

    /// One side declined: both users go back to waiting.
    async fn reject(&self, record: MatchRecord, rejecting_user: &str) -> MatchResult<()> {
        let counterpart_id = record.counterpart_of(rejecting_user).map(str::to_string);

        if let Some(responder) = self.deps.store.get_user(rejecting_user).await? {
            if responder.match_id == Some(record.match_id) {
                self.return_to_waiting(responder).await;
            }
        }

        if let Some(counterpart_id) = counterpart_id {
            if let Some(counterpart) = self.deps.store.get_user(&counterpart_id).await? {
                if counterpart.match_id == Some(record.match_id)
                    && self.return_to_waiting(counterpart).await
                {
                    self.notify(&counterpart_id, &MatchEvent::MatchFailed).await;
                }
            }
        }

        info!(match_id = %record.match_id, %rejecting_user, "match rejected");

        self.deps.store.delete_match(&record.match_id).await?;
        Ok(())
    }

    /// Accept-window expiry. A record that is already gone means the match
    /// resolved in time and the timer has nothing to do.
    pub async fn handle_timeout(&self, match_id: MatchId) -> MatchResult<()> {
        let record = match self.deps.store.get_match(&match_id).await? {
            Some(record) => record,
            None => return Ok(()),
        };

        for user_id in &record.user_ids {
            if let Some(user) = self.deps.store.get_user(user_id).await? {
                if user.match_id == Some(match_id) && self.return_to_waiting(user).await {
                    self.notify(user_id, &MatchEvent::CancelMatched).await;
                }
            }
        }

        info!(%match_id, "proposal expired");

        self.deps.store.delete_match(&match_id).await?;
        Ok(())
    }

    /// Reset a user to WAITING, persist, re-enqueue, and announce them.
    ///
    /// Best-effort: a failed write is logged and reported so the rest of a
    /// resolving transition, the record deletion included, still runs.
    async fn return_to_waiting(&self, mut user: UserMatchRecord) -> bool {
        user.reset_to_waiting();
        if let Err(error) = self.deps.store.put_user(&user).await {
            warn!(user_id = %user.user_id, %error, "reset to waiting failed");
            return false;
        }
        self.pool
            .enqueue(&user.user_id, user.start_time.timestamp_millis())
            .await;
        self.broadcast(&MatchEvent::NewUser {
            user_id: user.user_id.clone(),
            concern: user.concern.clone(),
            mbti: user.mbti,
        })
        .await;
        true
    }

    /// Undo the MATCHED write of a proposal that failed partway through.
    /// The pair never left the pool at this point, so only the record needs
    /// resetting.
    async fn unwind_proposal(&self, mut user: UserMatchRecord) {
        user.reset_to_waiting();
        if let Err(error) = self.deps.store.put_user(&user).await {
            warn!(user_id = %user.user_id, %error, "rollback of proposal write failed");
        }
    }

    async fn require_user(&self, user_id: &str) -> MatchResult<UserMatchRecord> {
        self.deps.store.get_user(user_id).await?.ok_or_else(|| {
            MatchError::Invariant(format!("no user record for {user_id} under a live match"))
        })
    }

    async fn notify(&self, user_id: &str, event: &MatchEvent) {
        if let Err(error) = self.deps.notifier.notify_user(user_id, event).await {
            warn!(%user_id, %error, "user notification failed");
        }
    }

    async fn broadcast(&self, event: &MatchEvent) {
        if let Err(error) = self.deps.notifier.broadcast(event).await {
            warn!(%error, "broadcast failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::RwLock;

    use crate::domains::matching::models::MatchStatus;
    use crate::kernel::notifier::TestNotifier;
    use crate::kernel::state_store::{BaseStateStore, InMemoryStateStore};
    use crate::kernel::test_dependencies::{
        MockChatService, MockSimilarityService, MockUserDirectory,
    };

    /// Store wrapper that fails scripted writes, for unwinding tests.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStateStore,
        fail_match_writes: AtomicBool,
        fail_user_writes_for: RwLock<Option<String>>,
    }

    impl FlakyStore {
        fn break_match_writes(&self) {
            self.fail_match_writes.store(true, Ordering::SeqCst);
        }

        fn break_user_writes_for(&self, user_id: &str) {
            *self
                .fail_user_writes_for
                .write()
                .unwrap_or_else(|e| e.into_inner()) = Some(user_id.to_string());
        }
    }

    #[async_trait]
    impl BaseStateStore for FlakyStore {
        async fn get_user(&self, user_id: &str) -> Result<Option<UserMatchRecord>> {
            self.inner.get_user(user_id).await
        }

        async fn put_user(&self, record: &UserMatchRecord) -> Result<()> {
            let blocked = self
                .fail_user_writes_for
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .as_deref()
                == Some(record.user_id.as_str());
            if blocked {
                return Err(anyhow!("scripted user write failure"));
            }
            self.inner.put_user(record).await
        }

        async fn delete_user(&self, user_id: &str) -> Result<()> {
            self.inner.delete_user(user_id).await
        }

        async fn get_match(&self, match_id: &MatchId) -> Result<Option<MatchRecord>> {
            self.inner.get_match(match_id).await
        }

        async fn put_match(&self, record: &MatchRecord) -> Result<()> {
            if self.fail_match_writes.load(Ordering::SeqCst) {
                return Err(anyhow!("scripted match write failure"));
            }
            self.inner.put_match(record).await
        }

        async fn delete_match(&self, match_id: &MatchId) -> Result<()> {
            self.inner.delete_match(match_id).await
        }
    }

    struct Fixture {
        store: Arc<FlakyStore>,
        orchestrator: Arc<MatchOrchestrator>,
        pool: Arc<WaitingPool>,
        notifier: Arc<TestNotifier>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(FlakyStore::default());
        let pool = Arc::new(WaitingPool::new());
        let notifier = Arc::new(TestNotifier::new());
        let deps = MatchDeps {
            store: store.clone(),
            notifier: notifier.clone(),
            similarity: Arc::new(MockSimilarityService::new(0.9)),
            chat: Arc::new(MockChatService::new()),
            directory: Arc::new(MockUserDirectory::new()),
        };
        let orchestrator = Arc::new(MatchOrchestrator::new(
            deps,
            Arc::clone(&pool),
            MatchTuning::default(),
        ));
        Fixture {
            store,
            orchestrator,
            pool,
            notifier,
        }
    }

    async fn seed_waiting(fx: &Fixture, user_id: &str) {
        let record = UserMatchRecord::new_waiting(
            user_id.to_string(),
            format!("{user_id} concern"),
            None,
            None,
            None,
        );
        fx.store.put_user(&record).await.unwrap();
        fx.pool
            .enqueue(user_id, record.start_time.timestamp_millis())
            .await;
    }

    async fn seed_matched_pair(fx: &Fixture, user_a: &str, user_b: &str) -> MatchId {
        seed_waiting(fx, user_a).await;
        seed_waiting(fx, user_b).await;
        let match_id = MatchId::new();
        for user_id in [user_a, user_b] {
            let mut record = fx.store.get_user(user_id).await.unwrap().unwrap();
            record.mark_matched(match_id);
            fx.store.put_user(&record).await.unwrap();
            fx.pool.remove(user_id).await;
        }
        let record = MatchRecord::new(match_id, user_a.to_string(), user_b.to_string(), 0.9);
        fx.store.put_match(&record).await.unwrap();
        match_id
    }

    #[tokio::test]
    async fn failed_match_record_write_resets_both_users() {
        let fx = fixture();
        seed_waiting(&fx, "alice").await;
        seed_waiting(&fx, "bob").await;
        fx.store.break_match_writes();

        let result = Arc::clone(&fx.orchestrator)
            .run_proposal_cycle("alice", false)
            .await;
        assert!(result.is_err());

        for user_id in ["alice", "bob"] {
            let record = fx.store.get_user(user_id).await.unwrap().unwrap();
            assert_eq!(record.status, MatchStatus::Waiting);
            assert_eq!(record.match_id, None);
            assert!(fx.pool.contains(user_id).await);
        }
        assert_eq!(fx.notifier.delivery_count(), 0);
    }

    #[tokio::test]
    async fn failed_candidate_write_rolls_the_first_user_back() {
        let fx = fixture();
        seed_waiting(&fx, "alice").await;
        seed_waiting(&fx, "bob").await;
        fx.store.break_user_writes_for("bob");

        let result = Arc::clone(&fx.orchestrator)
            .run_proposal_cycle("alice", false)
            .await;
        assert!(result.is_err());

        let alice = fx.store.get_user("alice").await.unwrap().unwrap();
        assert_eq!(alice.status, MatchStatus::Waiting);
        assert_eq!(alice.match_id, None);
        let bob = fx.store.get_user("bob").await.unwrap().unwrap();
        assert_eq!(bob.status, MatchStatus::Waiting);
    }

    #[tokio::test]
    async fn reject_resolves_even_when_the_counterpart_reset_fails() {
        let fx = fixture();
        let match_id = seed_matched_pair(&fx, "alice", "bob").await;
        fx.store.break_user_writes_for("bob");

        fx.orchestrator
            .respond(match_id, "alice", false)
            .await
            .unwrap();

        assert!(fx.store.get_match(&match_id).await.unwrap().is_none());
        let alice = fx.store.get_user("alice").await.unwrap().unwrap();
        assert_eq!(alice.status, MatchStatus::Waiting);
        assert!(fx.pool.contains("alice").await);
        // The failed reset is logged, not surfaced as a MATCH_FAILED event.
        assert!(fx.notifier.events_for_user("bob").is_empty());
    }

    #[tokio::test]
    async fn vanished_user_under_a_live_match_is_an_invariant_breach() {
        let fx = fixture();
        let error = fx.orchestrator.require_user("ghost").await.unwrap_err();
        assert!(matches!(error, MatchError::Invariant(_)));
    }
}

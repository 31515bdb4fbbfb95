//! Matching entry points and the scheduler loops.
//!
//! `MatchService` owns the waiting pool and the orchestrator, and funnels
//! proposal work through a single worker task so immediate attempts (on
//! join and on a relax choice) never race each other over the same users.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::common::{MatchError, MatchResult, Mbti};
use crate::config::MatchTuning;
use crate::domains::matching::events::MatchEvent;
use crate::domains::matching::models::{MatchId, MatchStatus, UserMatchRecord};
use crate::domains::matching::orchestrator::MatchOrchestrator;
use crate::domains::matching::pool::WaitingPool;
use crate::kernel::deps::MatchDeps;
use crate::kernel::traits::PresenceStatus;

/// Join request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMatching {
    pub concern: String,
    #[serde(default)]
    pub preferred_mbti: Option<Mbti>,
    #[serde(default)]
    pub additional_info: Option<serde_json::Value>,
}

/// What a user picks when told they have waited too long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutChoice {
    Wait,
    Relax,
    Next,
}

struct ProposalTask {
    user_id: String,
    relaxed: bool,
}

pub struct MatchService {
    deps: MatchDeps,
    tuning: MatchTuning,
    pool: Arc<WaitingPool>,
    orchestrator: Arc<MatchOrchestrator>,
    tasks: mpsc::UnboundedSender<ProposalTask>,
}

impl MatchService {
    pub fn new(deps: MatchDeps, tuning: MatchTuning) -> Arc<Self> {
        let pool = Arc::new(WaitingPool::new());
        let orchestrator = Arc::new(MatchOrchestrator::new(
            deps.clone(),
            Arc::clone(&pool),
            tuning.clone(),
        ));

        let (tasks, mut rx) = mpsc::unbounded_channel::<ProposalTask>();
        let worker = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                let cycle = Arc::clone(&worker);
                match cycle.run_proposal_cycle(&task.user_id, task.relaxed).await {
                    Ok(proposed) => {
                        debug!(user_id = %task.user_id, proposed, "proposal cycle finished")
                    }
                    Err(error) => {
                        warn!(user_id = %task.user_id, %error, "proposal cycle failed")
                    }
                }
            }
        });

        Arc::new(Self {
            deps,
            tuning,
            pool,
            orchestrator,
            tasks,
        })
    }

    pub fn tuning(&self) -> &MatchTuning {
        &self.tuning
    }

    pub fn pool(&self) -> &Arc<WaitingPool> {
        &self.pool
    }

    /// Enter the waiting pool and trigger an immediate proposal attempt.
    ///
    /// Joining again while already WAITING refreshes the concern and
    /// preference but keeps the original queue position.
    pub async fn start_matching(&self, user_id: &str, request: StartMatching) -> MatchResult<()> {
        let concern = request.concern.trim();
        if concern.is_empty() {
            return Err(MatchError::InvalidRequest("concern must not be empty".into()));
        }

        let existing = self.deps.store.get_user(user_id).await?;
        if let Some(existing) = &existing {
            if existing.status == MatchStatus::Matched {
                return Err(MatchError::InvalidRequest(
                    "user already has a pending match".into(),
                ));
            }
        }

        let profile = self
            .deps
            .directory
            .get_profile(user_id)
            .await
            .map_err(MatchError::External)?
            .ok_or_else(|| MatchError::InvalidRequest(format!("unknown user: {user_id}")))?;

        let mut record = UserMatchRecord::new_waiting(
            user_id.to_string(),
            concern.to_string(),
            profile.mbti,
            request.preferred_mbti,
            request.additional_info,
        );
        if let Some(existing) = existing {
            record.start_time = existing.start_time;
        }

        self.deps.store.put_user(&record).await?;
        self.pool
            .enqueue(user_id, record.start_time.timestamp_millis())
            .await;

        self.notify(user_id, &MatchEvent::Waiting).await;
        self.broadcast(&MatchEvent::NewUser {
            user_id: user_id.to_string(),
            concern: record.concern.clone(),
            mbti: record.mbti,
        })
        .await;

        info!(%user_id, "user joined matching");
        self.submit(user_id, false);
        Ok(())
    }

    /// Leave matching entirely. A pending proposal is rejected on the way
    /// out so the counterpart is released. Safe to call when not matching.
    pub async fn cancel_matching(&self, user_id: &str) -> MatchResult<()> {
        let record = match self.deps.store.get_user(user_id).await? {
            Some(record) => record,
            None => return Ok(()),
        };

        if let (MatchStatus::Matched, Some(match_id)) = (record.status, record.match_id) {
            self.orchestrator.respond(match_id, user_id, false).await?;
        }

        self.pool.remove(user_id).await;
        self.deps.store.delete_user(user_id).await?;
        self.broadcast(&MatchEvent::ExitUser {
            user_id: user_id.to_string(),
        })
        .await;
        if let Err(error) = self
            .deps
            .directory
            .set_presence(user_id, PresenceStatus::Idle)
            .await
        {
            warn!(%user_id, %error, "presence update failed");
        }

        info!(%user_id, "user left matching");
        Ok(())
    }

    /// When the user's current waiting phase began.
    pub async fn start_time(&self, user_id: &str) -> MatchResult<DateTime<Utc>> {
        self.deps
            .store
            .get_user(user_id)
            .await?
            .map(|record| record.start_time)
            .ok_or_else(|| MatchError::NotFound(format!("matching session for {user_id}")))
    }

    /// Accept or reject a proposed match.
    pub async fn match_response(
        &self,
        user_id: &str,
        match_id: MatchId,
        accepted: bool,
    ) -> MatchResult<()> {
        self.orchestrator.respond(match_id, user_id, accepted).await
    }

    /// Act on a timeout-options choice.
    pub async fn timeout_choice(&self, user_id: &str, choice: TimeoutChoice) -> MatchResult<()> {
        let mut record = self
            .deps
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("matching session for {user_id}")))?;
        if !record.is_waiting() {
            return Err(MatchError::InvalidRequest(
                "timeout choices only apply while waiting".into(),
            ));
        }

        match choice {
            TimeoutChoice::Wait => {
                // Fresh waiting phase: the timeout clock and queue position
                // both restart.
                self.pool.remove(user_id).await;
                record.start_time = Utc::now();
                self.deps.store.put_user(&record).await?;
                self.pool
                    .enqueue(user_id, record.start_time.timestamp_millis())
                    .await;
                self.notify(user_id, &MatchEvent::WaitingExtended).await;
            }
            TimeoutChoice::Relax => {
                record.preferred_mbti = None;
                self.deps.store.put_user(&record).await?;
                self.notify(user_id, &MatchEvent::CriteriaRelaxed).await;
                self.submit(user_id, true);
            }
            TimeoutChoice::Next => {
                self.pool.remove(user_id).await;
                self.deps.store.delete_user(user_id).await?;
                self.notify(user_id, &MatchEvent::NextSession).await;
                self.broadcast(&MatchEvent::ExitUser {
                    user_id: user_id.to_string(),
                })
                .await;
            }
        }
        Ok(())
    }

    /// Periodic pass over the longest-waiting users.
    ///
    /// Users are processed oldest first and each unmatched user is put back
    /// in the pool before the next one runs, so members of the same batch
    /// can still be paired with each other.
    pub async fn run_sweep(&self) {
        let batch = self
            .pool
            .dequeue_batch(self.tuning.sweep_batch_size, self.deps.store.as_ref())
            .await;
        if batch.is_empty() {
            return;
        }
        debug!(batch_size = batch.len(), "sweep started");

        for user_id in batch {
            if let Err(error) = self.sweep_user(&user_id).await {
                warn!(%user_id, %error, "sweep attempt failed");
                self.requeue_if_waiting(&user_id).await;
            }
        }
    }

    async fn sweep_user(&self, user_id: &str) -> MatchResult<()> {
        let record = match self.deps.store.get_user(user_id).await? {
            Some(record) if record.is_waiting() => record,
            _ => return Ok(()),
        };

        let waited = Utc::now().signed_duration_since(record.start_time);
        let timed_out = waited.to_std().map(|w| w >= self.tuning.wait_timeout).unwrap_or(false);

        if timed_out {
            // One relaxed attempt, then hand the decision to the user.
            let proposed = Arc::clone(&self.orchestrator)
                .run_proposal_cycle(user_id, true)
                .await?;
            if !proposed {
                let mut refreshed = match self.deps.store.get_user(user_id).await? {
                    Some(record) if record.is_waiting() => record,
                    _ => return Ok(()),
                };
                self.notify(user_id, &MatchEvent::timeout_options(waited.num_seconds()))
                    .await;
                refreshed.start_time = Utc::now();
                self.deps.store.put_user(&refreshed).await?;
                self.pool
                    .enqueue(user_id, refreshed.start_time.timestamp_millis())
                    .await;
            }
            return Ok(());
        }

        Arc::clone(&self.orchestrator)
            .run_proposal_cycle(user_id, false)
            .await?;
        self.requeue_if_waiting(user_id).await;
        Ok(())
    }

    /// Put a user back in the pool at their original position if their
    /// record still says WAITING.
    async fn requeue_if_waiting(&self, user_id: &str) {
        match self.deps.store.get_user(user_id).await {
            Ok(Some(record)) if record.is_waiting() => {
                self.pool
                    .enqueue(user_id, record.start_time.timestamp_millis())
                    .await;
            }
            Ok(_) => {}
            Err(error) => warn!(%user_id, %error, "requeue lookup failed"),
        }
    }

    /// Periodic eviction of pool entries with stale or missing records.
    pub async fn run_gc(&self) {
        let evicted = self.pool.collect_garbage(self.deps.store.as_ref()).await;
        if evicted > 0 {
            info!(evicted, "waiting pool garbage collected");
        }
    }

    fn submit(&self, user_id: &str, relaxed: bool) {
        let task = ProposalTask {
            user_id: user_id.to_string(),
            relaxed,
        };
        if self.tasks.send(task).is_err() {
            warn!(%user_id, "proposal worker is gone");
        }
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

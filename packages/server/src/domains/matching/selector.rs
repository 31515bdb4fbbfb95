//! Candidate selection for a user looking for a match.
//!
//! Normal mode scans the oldest slice of the pool and applies the base
//! user's MBTI preference. Relaxed mode scans the whole pool and ignores the
//! preference. Either way the result is capped oldest-first, so the
//! longest-waiting compatible users are scored first.

use anyhow::Result;

use crate::config::MatchTuning;
use crate::domains::matching::models::UserMatchRecord;
use crate::domains::matching::pool::WaitingPool;
use crate::kernel::state_store::BaseStateStore;

/// Whether `candidate` may be paired with `base`.
fn is_valid_candidate(base: &UserMatchRecord, candidate: &UserMatchRecord, relaxed: bool) -> bool {
    if candidate.user_id == base.user_id {
        return false;
    }
    if !candidate.is_waiting() {
        return false;
    }
    if relaxed {
        return true;
    }
    match base.preferred_mbti {
        Some(preferred) => candidate.mbti == Some(preferred),
        None => true,
    }
}

/// Collect up to `tuning.candidate_pool_size` candidates for `base`,
/// oldest-waiting first.
pub async fn select_candidates(
    base: &UserMatchRecord,
    pool: &WaitingPool,
    store: &dyn BaseStateStore,
    tuning: &MatchTuning,
    relaxed: bool,
) -> Result<Vec<UserMatchRecord>> {
    let scan: Vec<String> = if relaxed {
        pool.snapshot_all().await
    } else {
        pool.oldest(tuning.candidate_pool_size).await
    };

    let mut candidates = Vec::new();
    for user_id in scan {
        if candidates.len() >= tuning.candidate_pool_size {
            break;
        }
        if let Some(record) = store.get_user(&user_id).await? {
            if is_valid_candidate(base, &record, relaxed) {
                candidates.push(record);
            }
        }
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Mbti;
    use crate::domains::matching::models::MatchId;
    use crate::kernel::state_store::InMemoryStateStore;

    fn waiting(user_id: &str, mbti: Option<Mbti>, preferred: Option<Mbti>) -> UserMatchRecord {
        UserMatchRecord::new_waiting(
            user_id.to_string(),
            format!("concern of {user_id}"),
            mbti,
            preferred,
            None,
        )
    }

    async fn seed(store: &InMemoryStateStore, pool: &WaitingPool, records: Vec<UserMatchRecord>) {
        for (i, record) in records.into_iter().enumerate() {
            pool.enqueue(&record.user_id, 1000 + i as i64).await;
            store.put_user(&record).await.unwrap();
        }
    }

    #[tokio::test]
    async fn excludes_self_and_non_waiting() {
        let store = InMemoryStateStore::new();
        let pool = WaitingPool::new();
        let base = waiting("base", None, None);

        let mut matched = waiting("matched", None, None);
        matched.mark_matched(MatchId::new());

        seed(
            &store,
            &pool,
            vec![base.clone(), matched, waiting("free", None, None)],
        )
        .await;

        let tuning = MatchTuning::default();
        let found = select_candidates(&base, &pool, &store, &tuning, false)
            .await
            .unwrap();

        let ids: Vec<&str> = found.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["free"]);
    }

    #[tokio::test]
    async fn preference_filters_unless_relaxed() {
        let store = InMemoryStateStore::new();
        let pool = WaitingPool::new();
        let base = waiting("base", Some(Mbti::Entp), Some(Mbti::Infp));

        seed(
            &store,
            &pool,
            vec![
                base.clone(),
                waiting("infp", Some(Mbti::Infp), None),
                waiting("estj", Some(Mbti::Estj), None),
                waiting("untyped", None, None),
            ],
        )
        .await;

        let tuning = MatchTuning::default();

        let strict = select_candidates(&base, &pool, &store, &tuning, false)
            .await
            .unwrap();
        let ids: Vec<&str> = strict.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["infp"]);

        let relaxed = select_candidates(&base, &pool, &store, &tuning, true)
            .await
            .unwrap();
        let ids: Vec<&str> = relaxed.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["infp", "estj", "untyped"]);
    }

    #[tokio::test]
    async fn caps_oldest_first() {
        let store = InMemoryStateStore::new();
        let pool = WaitingPool::new();
        let base = waiting("base", None, None);
        store.put_user(&base).await.unwrap();

        let mut records = Vec::new();
        for i in 0..5 {
            records.push(waiting(&format!("u{i}"), None, None));
        }
        seed(&store, &pool, records).await;

        let tuning = MatchTuning {
            candidate_pool_size: 3,
            ..MatchTuning::default()
        };
        let found = select_candidates(&base, &pool, &store, &tuning, false)
            .await
            .unwrap();

        let ids: Vec<&str> = found.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u0", "u1", "u2"]);
    }
}

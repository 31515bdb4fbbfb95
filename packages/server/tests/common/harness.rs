//! In-process test harness.
//!
//! Wires a real `MatchService` to the in-memory store and the mock
//! similarity/chat/directory services, with a recording notifier. Tests run
//! under a paused tokio clock, so `sleep`-based helpers advance virtual time
//! and let the proposal worker and timers run deterministically.

use std::sync::Arc;
use std::time::Duration;

use server_core::common::{MatchResult, Mbti};
use server_core::domains::matching::models::MatchId;
use server_core::domains::matching::service::{MatchService, StartMatching};
use server_core::kernel::notifier::TestNotifier;
use server_core::kernel::state_store::InMemoryStateStore;
use server_core::kernel::test_dependencies::{
    MockChatService, MockSimilarityService, MockUserDirectory,
};
use server_core::kernel::traits::UserProfile;
use server_core::kernel::MatchDeps;
use server_core::MatchTuning;

pub struct TestHarness {
    pub service: Arc<MatchService>,
    pub store: Arc<InMemoryStateStore>,
    pub notifier: Arc<TestNotifier>,
    pub similarity: Arc<MockSimilarityService>,
    pub chat: Arc<MockChatService>,
    pub directory: Arc<MockUserDirectory>,
}

impl TestHarness {
    /// Harness whose similarity service scores every unscripted pair 0.0.
    pub fn new() -> Self {
        Self::with_default_score(0.0)
    }

    pub fn with_default_score(default_score: f64) -> Self {
        let store = Arc::new(InMemoryStateStore::new());
        let notifier = Arc::new(TestNotifier::new());
        let similarity = Arc::new(MockSimilarityService::new(default_score));
        let chat = Arc::new(MockChatService::new());
        let directory = Arc::new(MockUserDirectory::new());

        let deps = MatchDeps {
            store: store.clone(),
            notifier: notifier.clone(),
            similarity: similarity.clone(),
            chat: chat.clone(),
            directory: directory.clone(),
        };
        let service = MatchService::new(deps, MatchTuning::default());

        Self {
            service,
            store,
            notifier,
            similarity,
            chat,
            directory,
        }
    }

    /// Make the directory know a user, so joining succeeds.
    pub fn register(&self, user_id: &str, mbti: Option<Mbti>) {
        self.directory.set_profile(
            user_id,
            UserProfile {
                mbti,
                ..Default::default()
            },
        );
    }

    pub async fn join(&self, user_id: &str, concern: &str) -> MatchResult<()> {
        self.join_preferring(user_id, concern, None).await
    }

    pub async fn join_preferring(
        &self,
        user_id: &str,
        concern: &str,
        preferred_mbti: Option<Mbti>,
    ) -> MatchResult<()> {
        self.service
            .start_matching(
                user_id,
                StartMatching {
                    concern: concern.to_string(),
                    preferred_mbti,
                    additional_info: None,
                },
            )
            .await
    }

    /// The match id currently attached to a user, if any.
    pub async fn match_id_of(&self, user_id: &str) -> Option<MatchId> {
        use server_core::kernel::state_store::BaseStateStore;
        self.store
            .get_user(user_id)
            .await
            .expect("store read")
            .and_then(|record| record.match_id)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Let queued background work (the proposal worker, due timers) run to
/// completion. Under a paused clock this advances virtual time slightly.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Advance past the proposal notify delay (3s).
pub async fn pass_notify_delay() {
    tokio::time::sleep(Duration::from_secs(4)).await;
}

/// Advance past the accept window (60s).
pub async fn pass_accept_window() {
    tokio::time::sleep(Duration::from_secs(61)).await;
}

//! Dependency container wired at startup and handed to the domain layer.

use std::sync::Arc;

use super::notifier::BaseNotifier;
use super::state_store::BaseStateStore;
use super::traits::{BaseChatService, BaseSimilarityService, BaseUserDirectory};

/// Everything the matching domain needs from the outside world.
#[derive(Clone)]
pub struct MatchDeps {
    pub store: Arc<dyn BaseStateStore>,
    pub notifier: Arc<dyn BaseNotifier>,
    pub similarity: Arc<dyn BaseSimilarityService>,
    pub chat: Arc<dyn BaseChatService>,
    pub directory: Arc<dyn BaseUserDirectory>,
}

pub mod auth_client;
pub mod chat_client;
pub mod deps;
pub mod notifier;
pub mod scheduled_tasks;
pub mod similarity_client;
pub mod state_store;
pub mod test_dependencies;
pub mod traits;

pub use deps::MatchDeps;
pub use notifier::{BaseNotifier, DeliveredEvent, NatsNotifier, TestNotifier};
pub use state_store::{BaseStateStore, InMemoryStateStore};
pub use traits::{
    BaseChatService, BaseSimilarityService, BaseUserDirectory, ChatRoom, PresenceStatus,
    UserProfile,
};

pub mod events;
pub mod models;
pub mod orchestrator;
pub mod pool;
pub mod scorer;
pub mod selector;
pub mod service;

// Re-export commonly used types
pub use events::MatchEvent;
pub use models::{MatchId, MatchRecord, MatchStatus, UserMatchRecord};
pub use orchestrator::MatchOrchestrator;
pub use pool::WaitingPool;
pub use service::{MatchService, StartMatching, TimeoutChoice};

pub mod health;
pub mod matching;

pub use health::health_handler;

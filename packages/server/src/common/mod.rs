pub mod error;
pub mod mbti;

pub use error::{MatchError, MatchResult};
pub use mbti::Mbti;

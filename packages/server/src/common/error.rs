//! Error taxonomy for matching operations.
//!
//! Four failure classes with distinct handling:
//! - invalid input: reject the request, no state mutation
//! - not found: idempotent no-op on response paths, 404 on explicit queries
//! - external dependency failure: bounded retry happened upstream; the commit
//!   path rolls the match back before surfacing this
//! - invariant violation: abort processing of that match, never the scheduler

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("external service failure: {0}")]
    External(#[source] anyhow::Error),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl MatchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MatchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MatchError::NotFound(_) => StatusCode::NOT_FOUND,
            MatchError::External(_) | MatchError::Invariant(_) | MatchError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type MatchResult<T> = Result<T, MatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            MatchError::InvalidRequest("bad mbti".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            MatchError::NotFound("user abc".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            MatchError::External(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

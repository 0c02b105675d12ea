use thiserror::Error;
use votes_repository::VotesRepositoryError;
use votes_shared::types::Target;

/// Errors returned by `VoteService` operations.
///
/// Mapping these onto transport status codes is left to the caller-facing layer.
#[derive(Debug, Error)]
pub enum VoteError {
    /// Malformed input, rejected before the store is touched.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The post or comment does not exist. Not retried.
    #[error("Target not found: {0}")]
    NotFound(Target),

    /// Lost a race against a simultaneous request for the same vote.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connectivity or timeout against the store.
    #[error("Store unavailable: {0}")]
    TransientStore(String),

    #[error("Store error: {0}")]
    Store(#[source] VotesRepositoryError),
}

impl VoteError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::TransientStore(_))
    }
}

impl From<VotesRepositoryError> for VoteError {
    fn from(err: VotesRepositoryError) -> Self {
        match err {
            VotesRepositoryError::TargetNotFound(target) => Self::NotFound(target),
            VotesRepositoryError::Conflict(reason) => Self::Conflict(reason),
            VotesRepositoryError::Unavailable(reason) => Self::TransientStore(reason),
            other => Self::Store(other),
        }
    }
}

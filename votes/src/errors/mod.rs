//! Error types for the votes maintenance binary.
use thiserror::Error;
use votes_repository::VotesRepositoryError;
use votes_service::VoteError;

#[derive(Debug, Error)]
pub enum MaintenanceError {
    /// A required variable is missing or a value does not parse.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] VotesRepositoryError),

    #[error("Vote service error: {0}")]
    Service(#[from] VoteError),
}

impl MaintenanceError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

//! Error types for vote persistence.
//! Classifies backend failures into the categories callers act on: missing
//! targets, uniqueness races, transient unavailability and everything else.
use thiserror::Error;
use votes_shared::types::Target;

/// Represents errors that can occur within the votes repository.
#[derive(Debug, Error)]
pub enum VotesRepositoryError {
    /// The referenced post or comment does not exist.
    #[error("Target not found: {0}")]
    TargetNotFound(Target),

    /// A concurrent writer won a race on the same vote row
    /// (unique violation, serialization failure or deadlock).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store could not be reached or timed out.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid vote type: {0}")]
    InvalidVoteType(i16),

    #[error("Vote {0} must reference exactly one post or comment")]
    InvalidTargetReference(uuid::Uuid),
}

/// SQLSTATE codes the repository distinguishes.
mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const TOO_MANY_CONNECTIONS: &str = "53300";
    pub const ADMIN_SHUTDOWN: &str = "57P01";
    pub const CANNOT_CONNECT_NOW: &str = "57P03";
}

impl VotesRepositoryError {
    /// Whether a foreign key rejected the write, meaning the target is gone.
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, Self::DatabaseError(sqlx::Error::Database(db))
            if db.code().as_deref() == Some(sqlstate::FOREIGN_KEY_VIOLATION))
    }

    /// Replaces a foreign key violation with `TargetNotFound` for `target`.
    pub fn for_target(self, target: Target) -> Self {
        if self.is_foreign_key_violation() {
            Self::TargetNotFound(target)
        } else {
            self
        }
    }
}

impl From<sqlx::Error> for VotesRepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let code = db.code().map(|code| code.into_owned()).unwrap_or_default();
            let message = db.message().to_string();
            match code.as_str() {
                sqlstate::UNIQUE_VIOLATION
                | sqlstate::SERIALIZATION_FAILURE
                | sqlstate::DEADLOCK_DETECTED => return Self::Conflict(message),
                sqlstate::TOO_MANY_CONNECTIONS
                | sqlstate::ADMIN_SHUTDOWN
                | sqlstate::CANNOT_CONNECT_NOW => return Self::Unavailable(message),
                // Class 08: connection exceptions.
                code if code.starts_with("08") => return Self::Unavailable(message),
                _ => {}
            }
        }

        let unavailable = matches!(
            err,
            sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        );
        if unavailable {
            Self::Unavailable(err.to_string())
        } else {
            Self::DatabaseError(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_unavailable() {
        let err = VotesRepositoryError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, VotesRepositoryError::Unavailable(_)));
    }

    #[test]
    fn test_io_error_is_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = VotesRepositoryError::from(sqlx::Error::Io(io));
        assert!(matches!(err, VotesRepositoryError::Unavailable(_)));
    }

    #[test]
    fn test_row_not_found_stays_database_error() {
        let err = VotesRepositoryError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, VotesRepositoryError::DatabaseError(_)));
        assert!(!err.is_foreign_key_violation());
    }

    #[test]
    fn test_for_target_keeps_unrelated_errors() {
        let err = VotesRepositoryError::Conflict("duplicate".to_string()).for_target(Target::post(1));
        assert!(matches!(err, VotesRepositoryError::Conflict(_)));
    }
}

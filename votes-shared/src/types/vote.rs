use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Target, UserId, VoteType};

/// A live vote record: one user's vote on one post or comment.
///
/// At most one `Vote` exists per `(user_id, target)`. The row is created on the
/// first cast, its `vote_type` flips on a direction switch, and it is deleted on
/// toggle-off or explicit removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub vote_id: Uuid,
    pub user_id: UserId,
    pub target: Target,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vote {
    /// Builds a fresh vote with a random id and both timestamps set to now.
    pub fn new(user_id: UserId, target: Target, vote_type: VoteType) -> Self {
        let now = Utc::now();
        Self {
            vote_id: Uuid::new_v4(),
            user_id,
            target,
            vote_type,
            created_at: now,
            updated_at: now,
        }
    }
}

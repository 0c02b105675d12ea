use serde::{Deserialize, Serialize};

use crate::types::VoteType;

/// The aggregate returned to callers after every vote operation.
///
/// `user_vote` reflects the caller's resulting state and is `None` when the
/// caller holds no vote on the target (or no caller was given).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummary {
    pub vote_count: i32,
    pub user_vote: Option<VoteType>,
}

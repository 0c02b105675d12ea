mod count_drift;
mod target;
mod vote;
mod vote_state;
mod vote_summary;
mod vote_type;

pub use count_drift::CountDrift;
pub use target::{Target, TargetId, TargetKind, UserId};
pub use vote::Vote;
pub use vote_state::{VoteState, VoteTransition};
pub use vote_summary::VoteSummary;
pub use vote_type::{InvalidVoteType, VoteType};

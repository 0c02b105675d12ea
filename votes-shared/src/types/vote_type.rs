use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a vote. Stored and exchanged as `+1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum VoteType {
    /// An upvote, worth `+1` in the aggregate.
    Up,
    /// A downvote, worth `-1` in the aggregate.
    Down,
}

/// Returned when an integer is neither `+1` nor `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidVoteType(pub i16);

impl fmt::Display for InvalidVoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vote type must be 1 or -1, got {}", self.0)
    }
}

impl std::error::Error for InvalidVoteType {}

impl VoteType {
    /// Signed contribution of this vote to a target's `vote_count`.
    pub fn value(&self) -> i32 {
        match self {
            VoteType::Up => 1,
            VoteType::Down => -1,
        }
    }
}

impl TryFrom<i16> for VoteType {
    type Error = InvalidVoteType;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteType::Up),
            -1 => Ok(VoteType::Down),
            other => Err(InvalidVoteType(other)),
        }
    }
}

impl From<VoteType> for i16 {
    fn from(vote_type: VoteType) -> Self {
        match vote_type {
            VoteType::Up => 1,
            VoteType::Down => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_accepts_only_unit_values() {
        assert_eq!(VoteType::try_from(1), Ok(VoteType::Up));
        assert_eq!(VoteType::try_from(-1), Ok(VoteType::Down));
        assert_eq!(VoteType::try_from(0), Err(InvalidVoteType(0)));
        assert_eq!(VoteType::try_from(2), Err(InvalidVoteType(2)));
        assert_eq!(VoteType::try_from(-2), Err(InvalidVoteType(-2)));
    }

    #[test]
    fn test_serde_uses_signed_integers() {
        assert_eq!(serde_json::to_string(&VoteType::Down).unwrap(), "-1");
        let parsed: VoteType = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, VoteType::Up);
        assert!(serde_json::from_str::<VoteType>("0").is_err());
    }
}

//! The per-(user, target) vote state machine.
//!
//! A user's relationship with a target is always one of three states. Casting a
//! vote or removing it moves between them, and every move carries the signed
//! delta that must be applied to the target's `vote_count` in the same commit as
//! the vote row mutation.
//!
//! ```text
//! NoVote     --cast(+1)-->  UpVoted                  (+1)
//! NoVote     --cast(-1)-->  DownVoted                (-1)
//! UpVoted    --cast(+1)-->  NoVote     [toggle-off]  (-1)
//! UpVoted    --cast(-1)-->  DownVoted  [switch]      (-2)
//! DownVoted  --cast(-1)-->  NoVote     [toggle-off]  (+1)
//! DownVoted  --cast(+1)-->  UpVoted    [switch]      (+2)
//! UpVoted    --remove-->    NoVote                   (-1)
//! DownVoted  --remove-->    NoVote                   (+1)
//! NoVote     --remove-->    NoVote     [no-op]       (0)
//! ```
use crate::types::VoteType;

/// Where a user currently stands on a target. `NoVote` is the absence of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteState {
    NoVote,
    UpVoted,
    DownVoted,
}

/// The row mutation a cast or remove resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    /// No prior row: insert one with the given direction.
    Insert(VoteType),
    /// Prior row in the opposite direction: rewrite it to the given direction.
    Flip(VoteType),
    /// Prior row is deleted. Carries the direction that was removed.
    Delete(VoteType),
    /// Nothing to do.
    Noop,
}

impl VoteState {
    /// The direction held in this state, if any.
    pub fn vote_type(&self) -> Option<VoteType> {
        match self {
            VoteState::NoVote => None,
            VoteState::UpVoted => Some(VoteType::Up),
            VoteState::DownVoted => Some(VoteType::Down),
        }
    }

    /// Resolves a cast of `requested` from this state.
    pub fn cast(self, requested: VoteType) -> VoteTransition {
        match (self, requested) {
            (VoteState::NoVote, requested) => VoteTransition::Insert(requested),
            (VoteState::UpVoted, VoteType::Up) => VoteTransition::Delete(VoteType::Up),
            (VoteState::UpVoted, VoteType::Down) => VoteTransition::Flip(VoteType::Down),
            (VoteState::DownVoted, VoteType::Down) => VoteTransition::Delete(VoteType::Down),
            (VoteState::DownVoted, VoteType::Up) => VoteTransition::Flip(VoteType::Up),
        }
    }

    /// Resolves an explicit removal from this state.
    pub fn remove(self) -> VoteTransition {
        match self.vote_type() {
            Some(held) => VoteTransition::Delete(held),
            None => VoteTransition::Noop,
        }
    }
}

impl From<Option<VoteType>> for VoteState {
    fn from(vote_type: Option<VoteType>) -> Self {
        match vote_type {
            None => VoteState::NoVote,
            Some(VoteType::Up) => VoteState::UpVoted,
            Some(VoteType::Down) => VoteState::DownVoted,
        }
    }
}

impl VoteTransition {
    /// Signed change to apply to the target's `vote_count`.
    pub fn delta(&self) -> i32 {
        match self {
            VoteTransition::Insert(vote_type) => vote_type.value(),
            VoteTransition::Flip(vote_type) => 2 * vote_type.value(),
            VoteTransition::Delete(removed) => -removed.value(),
            VoteTransition::Noop => 0,
        }
    }

    /// The state the user ends up in once the transition is committed.
    pub fn resulting_state(&self, from: VoteState) -> VoteState {
        match self {
            VoteTransition::Insert(vote_type) | VoteTransition::Flip(vote_type) => {
                VoteState::from(Some(*vote_type))
            }
            VoteTransition::Delete(_) => VoteState::NoVote,
            VoteTransition::Noop => from,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_transitions() {
        let cases = [
            (VoteState::NoVote, VoteType::Up, VoteTransition::Insert(VoteType::Up), 1, VoteState::UpVoted),
            (VoteState::NoVote, VoteType::Down, VoteTransition::Insert(VoteType::Down), -1, VoteState::DownVoted),
            (VoteState::UpVoted, VoteType::Up, VoteTransition::Delete(VoteType::Up), -1, VoteState::NoVote),
            (VoteState::UpVoted, VoteType::Down, VoteTransition::Flip(VoteType::Down), -2, VoteState::DownVoted),
            (VoteState::DownVoted, VoteType::Down, VoteTransition::Delete(VoteType::Down), 1, VoteState::NoVote),
            (VoteState::DownVoted, VoteType::Up, VoteTransition::Flip(VoteType::Up), 2, VoteState::UpVoted),
        ];

        for (from, requested, transition, delta, to) in cases {
            let actual = from.cast(requested);
            assert_eq!(actual, transition, "{:?} cast {:?}", from, requested);
            assert_eq!(actual.delta(), delta, "{:?} cast {:?}", from, requested);
            assert_eq!(actual.resulting_state(from), to, "{:?} cast {:?}", from, requested);
        }
    }

    #[test]
    fn test_remove_from_upvoted() {
        let transition = VoteState::UpVoted.remove();
        assert_eq!(transition, VoteTransition::Delete(VoteType::Up));
        assert_eq!(transition.delta(), -1);
        assert_eq!(transition.resulting_state(VoteState::UpVoted), VoteState::NoVote);
    }

    #[test]
    fn test_remove_from_downvoted() {
        let transition = VoteState::DownVoted.remove();
        assert_eq!(transition, VoteTransition::Delete(VoteType::Down));
        assert_eq!(transition.delta(), 1);
    }

    #[test]
    fn test_remove_without_vote_is_noop() {
        let transition = VoteState::NoVote.remove();
        assert_eq!(transition, VoteTransition::Noop);
        assert_eq!(transition.delta(), 0);
        assert_eq!(transition.resulting_state(VoteState::NoVote), VoteState::NoVote);
    }

    #[test]
    fn test_casting_twice_returns_to_start() {
        for vote_type in [VoteType::Up, VoteType::Down] {
            let first = VoteState::NoVote.cast(vote_type);
            let state = first.resulting_state(VoteState::NoVote);
            let second = state.cast(vote_type);
            assert_eq!(second.resulting_state(state), VoteState::NoVote);
            assert_eq!(first.delta() + second.delta(), 0);
        }
    }

    #[test]
    fn test_state_round_trips_through_vote_type() {
        for state in [VoteState::NoVote, VoteState::UpVoted, VoteState::DownVoted] {
            assert_eq!(VoteState::from(state.vote_type()), state);
        }
    }
}

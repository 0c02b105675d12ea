//! Error types returned by the vote service.
mod vote_error;

pub use vote_error::VoteError;

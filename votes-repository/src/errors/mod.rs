//! Error types for the votes repository.
mod votes_repository;

pub use votes_repository::VotesRepositoryError;

//! # Votes Repository
//! This crate provides the storage seam for votes: the `VotesRepository` and
//! `VoteTransaction` traits, the error type shared by every backend, a
//! PostgreSQL implementation and an in-memory implementation for tests and
//! local development.
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod postgres;

pub use errors::VotesRepositoryError;
pub use interfaces::{VoteTransaction, VotesRepository};
pub use memory::MemoryVotesRepository;
pub use postgres::PostgresVotesRepository;

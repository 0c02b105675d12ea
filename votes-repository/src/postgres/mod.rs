//! PostgreSQL implementation of the votes repository.
//!
//! ## Database Tables
//!
//! - `votes`: one row per (user, post) or (user, comment), enforced by partial
//!   unique indexes and a check that exactly one target column is set
//! - `posts`, `comments`: votable targets carrying the cached `vote_count`
//!
//! Schema migrations live in `migrations/` and are embedded with `sqlx::migrate!`.
mod votes_repository;

pub use votes_repository::{PostgresVoteTransaction, PostgresVotesRepository};

//! # Votes Shared
//! This crate defines the data structures shared by the vote repository and the
//! vote service: targets, vote directions, the per-user vote state machine and
//! the aggregates returned to callers.
pub mod types;

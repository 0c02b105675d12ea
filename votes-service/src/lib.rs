//! # Votes Service
//!
//! The high-level API for voting on posts and comments. It validates input,
//! resolves each request through the vote state machine, drives exactly one
//! atomic store transaction per attempt and returns the resulting aggregate.
//! Conflicts and transient store failures are retried according to
//! `VoteServiceConfig`.
pub mod config;
pub mod errors;
pub mod service;

pub use config::VoteServiceConfig;
pub use errors::VoteError;
pub use service::VoteService;

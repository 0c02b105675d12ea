//! This module defines the `VotesRepository` and `VoteTransaction` traits, the
//! storage seam between the vote service and a concrete backend.
//!
//! Every mutation goes through a `VoteTransaction`: the service locks the prior
//! vote, decides the transition, mutates the vote row and applies the counter
//! delta, then commits. A transaction that is dropped without `commit` is rolled
//! back, so cancelling a caller mid-operation never leaves the vote rows and the
//! cached `vote_count` out of step.
use async_trait::async_trait;
use uuid::Uuid;
use votes_shared::types::{CountDrift, Target, TargetKind, UserId, Vote, VoteSummary, VoteType};

use crate::errors::VotesRepositoryError;

/// A trait that defines the interface for interacting with the votes store.
#[async_trait]
pub trait VotesRepository: Send + Sync {
    /// Opens a new atomic unit of work.
    async fn begin(&self) -> Result<Box<dyn VoteTransaction>, VotesRepositoryError>;

    /// Fetches the caller's current vote on a target, if any.
    async fn get_user_vote(
        &self,
        user_id: UserId,
        target: Target,
    ) -> Result<Option<Vote>, VotesRepositoryError>;

    /// Fetches the aggregate for each existing target in `targets`.
    ///
    /// Results follow the order of `targets`; targets that do not exist are
    /// omitted. With `user_id = None` every `user_vote` is `None`.
    async fn get_vote_summaries(
        &self,
        user_id: Option<UserId>,
        targets: &[Target],
    ) -> Result<Vec<(Target, VoteSummary)>, VotesRepositoryError>;

    /// Lists targets of `kind` whose cached `vote_count` disagrees with their votes.
    async fn find_count_drifts(&self, kind: TargetKind) -> Result<Vec<CountDrift>, VotesRepositoryError>;

    /// Rewrites the cached `vote_count` of every drifted target of `kind`.
    ///
    /// Returns the drifts that were corrected.
    async fn repair_count_drifts(&self, kind: TargetKind) -> Result<Vec<CountDrift>, VotesRepositoryError>;

    /// Checks that the vote tables exist.
    async fn check_tables_created(&self) -> Result<bool, VotesRepositoryError>;
}

/// One atomic unit of work against the votes store.
#[async_trait]
pub trait VoteTransaction: Send {
    /// Reads the vote for `(user_id, target)` and holds it against concurrent
    /// writers until the transaction ends.
    async fn lock_vote(
        &mut self,
        user_id: UserId,
        target: Target,
    ) -> Result<Option<Vote>, VotesRepositoryError>;

    /// Inserts a new vote row.
    ///
    /// Fails with `TargetNotFound` when the target does not exist and with
    /// `Conflict` when a row for the same `(user_id, target)` already exists.
    async fn insert_vote(&mut self, vote: &Vote) -> Result<(), VotesRepositoryError>;

    /// Rewrites the direction of an existing vote and refreshes `updated_at`.
    async fn update_vote_type(
        &mut self,
        vote_id: Uuid,
        vote_type: VoteType,
    ) -> Result<(), VotesRepositoryError>;

    async fn delete_vote(&mut self, vote_id: Uuid) -> Result<(), VotesRepositoryError>;

    /// Adds `delta` to the target's `vote_count` as a single store-side
    /// increment and returns the new value.
    async fn apply_count_delta(&mut self, target: Target, delta: i32) -> Result<i32, VotesRepositoryError>;

    /// Reads the target's `vote_count` without modifying it.
    async fn read_count(&mut self, target: Target) -> Result<i32, VotesRepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), VotesRepositoryError>;
}

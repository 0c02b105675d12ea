//! In-memory votes repository for testing and local development.
//!
//! Transactions take an exclusive lock on the whole store and work on a staged
//! copy of it, so they are fully serialized and a transaction dropped before
//! `commit` leaves no trace. Failures of `begin` and `commit` can be queued up
//! front to exercise the caller's retry handling.
//!
//! # Example
//!
//! ```ignore
//! use votes_repository::{MemoryVotesRepository, VotesRepositoryError};
//! use votes_shared::types::Target;
//!
//! let repository = MemoryVotesRepository::with_targets([Target::post(42)]);
//! repository.fail_next_begin(VotesRepositoryError::Unavailable("down".into()));
//! ```
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;
use votes_shared::types::{CountDrift, Target, TargetKind, UserId, Vote, VoteSummary, VoteType};

use crate::{VoteTransaction, VotesRepository, VotesRepositoryError};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// Cached `vote_count` per existing target.
    counts: HashMap<Target, i32>,
    votes: HashMap<(UserId, Target), Vote>,
}

impl MemoryState {
    fn drifts(&self, kind: TargetKind) -> Vec<CountDrift> {
        let mut drifts: Vec<CountDrift> = self
            .counts
            .iter()
            .filter(|(target, _)| target.kind == kind)
            .filter_map(|(target, stored)| {
                let actual = self.sum_votes(*target);
                (actual != *stored).then_some(CountDrift { target: *target, stored: *stored, actual })
            })
            .collect();
        drifts.sort_by_key(|drift| drift.target.id);
        drifts
    }

    fn sum_votes(&self, target: Target) -> i32 {
        self.votes
            .values()
            .filter(|vote| vote.target == target)
            .map(|vote| vote.vote_type.value())
            .sum()
    }

    fn find_key(&self, vote_id: Uuid) -> Option<(UserId, Target)> {
        self.votes
            .iter()
            .find(|(_, vote)| vote.vote_id == vote_id)
            .map(|(key, _)| *key)
    }
}

type FailureQueue = Arc<StdMutex<VecDeque<VotesRepositoryError>>>;

fn pop_failure(queue: &FailureQueue) -> Option<VotesRepositoryError> {
    queue
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .pop_front()
}

fn push_failure(queue: &FailureQueue, error: VotesRepositoryError) {
    queue
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push_back(error);
}

/// In-memory implementation of `VotesRepository`.
#[derive(Default)]
pub struct MemoryVotesRepository {
    state: Arc<Mutex<MemoryState>>,
    begin_failures: FailureQueue,
    commit_failures: FailureQueue,
    transactions_begun: AtomicUsize,
}

impl MemoryVotesRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository whose given targets exist with `vote_count = 0`.
    pub fn with_targets(targets: impl IntoIterator<Item = Target>) -> Self {
        let state = MemoryState {
            counts: targets.into_iter().map(|target| (target, 0)).collect(),
            votes: HashMap::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            ..Self::default()
        }
    }

    /// Overwrites the cached count, bypassing vote rows. Used to simulate drift.
    pub async fn set_stored_count(&self, target: Target, vote_count: i32) {
        self.state.lock().await.counts.insert(target, vote_count);
    }

    pub async fn stored_count(&self, target: Target) -> Option<i32> {
        self.state.lock().await.counts.get(&target).copied()
    }

    /// Number of live vote rows referencing `target`.
    pub async fn vote_rows(&self, target: Target) -> usize {
        self.state
            .lock()
            .await
            .votes
            .values()
            .filter(|vote| vote.target == target)
            .count()
    }

    /// Makes the next call to `begin` fail with `error`. Calls queue up.
    pub fn fail_next_begin(&self, error: VotesRepositoryError) {
        push_failure(&self.begin_failures, error);
    }

    /// Makes the next `commit` apply its changes and then return `error`,
    /// as when the acknowledgement of a COMMIT is lost. Calls queue up.
    pub fn fail_next_commit(&self, error: VotesRepositoryError) {
        push_failure(&self.commit_failures, error);
    }

    /// Number of `begin` calls made so far, failed ones included.
    pub fn transactions_begun(&self) -> usize {
        self.transactions_begun.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VotesRepository for MemoryVotesRepository {
    async fn begin(&self) -> Result<Box<dyn VoteTransaction>, VotesRepositoryError> {
        self.transactions_begun.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = pop_failure(&self.begin_failures) {
            return Err(error);
        }

        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryVoteTransaction {
            guard,
            staged,
            commit_failures: self.commit_failures.clone(),
        }))
    }

    async fn get_user_vote(
        &self,
        user_id: UserId,
        target: Target,
    ) -> Result<Option<Vote>, VotesRepositoryError> {
        Ok(self.state.lock().await.votes.get(&(user_id, target)).cloned())
    }

    async fn get_vote_summaries(
        &self,
        user_id: Option<UserId>,
        targets: &[Target],
    ) -> Result<Vec<(Target, VoteSummary)>, VotesRepositoryError> {
        let state = self.state.lock().await;
        Ok(targets
            .iter()
            .filter_map(|target| {
                let vote_count = *state.counts.get(target)?;
                let user_vote = user_id
                    .and_then(|user_id| state.votes.get(&(user_id, *target)))
                    .map(|vote| vote.vote_type);
                Some((*target, VoteSummary { vote_count, user_vote }))
            })
            .collect())
    }

    async fn find_count_drifts(&self, kind: TargetKind) -> Result<Vec<CountDrift>, VotesRepositoryError> {
        Ok(self.state.lock().await.drifts(kind))
    }

    async fn repair_count_drifts(&self, kind: TargetKind) -> Result<Vec<CountDrift>, VotesRepositoryError> {
        let mut state = self.state.lock().await;
        let drifts = state.drifts(kind);
        for drift in &drifts {
            state.counts.insert(drift.target, drift.actual);
        }
        Ok(drifts)
    }

    async fn check_tables_created(&self) -> Result<bool, VotesRepositoryError> {
        Ok(true)
    }
}

/// A serialized unit of work over the in-memory store.
pub struct MemoryVoteTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    commit_failures: FailureQueue,
}

#[async_trait]
impl VoteTransaction for MemoryVoteTransaction {
    async fn lock_vote(
        &mut self,
        user_id: UserId,
        target: Target,
    ) -> Result<Option<Vote>, VotesRepositoryError> {
        Ok(self.staged.votes.get(&(user_id, target)).cloned())
    }

    async fn insert_vote(&mut self, vote: &Vote) -> Result<(), VotesRepositoryError> {
        if !self.staged.counts.contains_key(&vote.target) {
            return Err(VotesRepositoryError::TargetNotFound(vote.target));
        }
        let key = (vote.user_id, vote.target);
        if self.staged.votes.contains_key(&key) {
            return Err(VotesRepositoryError::Conflict(format!(
                "user {} already voted on {}",
                vote.user_id, vote.target
            )));
        }
        self.staged.votes.insert(key, vote.clone());
        Ok(())
    }

    async fn update_vote_type(
        &mut self,
        vote_id: Uuid,
        vote_type: VoteType,
    ) -> Result<(), VotesRepositoryError> {
        if let Some(key) = self.staged.find_key(vote_id) {
            if let Some(vote) = self.staged.votes.get_mut(&key) {
                vote.vote_type = vote_type;
                vote.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn delete_vote(&mut self, vote_id: Uuid) -> Result<(), VotesRepositoryError> {
        if let Some(key) = self.staged.find_key(vote_id) {
            self.staged.votes.remove(&key);
        }
        Ok(())
    }

    async fn apply_count_delta(&mut self, target: Target, delta: i32) -> Result<i32, VotesRepositoryError> {
        let vote_count = self
            .staged
            .counts
            .get_mut(&target)
            .ok_or(VotesRepositoryError::TargetNotFound(target))?;
        *vote_count += delta;
        Ok(*vote_count)
    }

    async fn read_count(&mut self, target: Target) -> Result<i32, VotesRepositoryError> {
        self.staged
            .counts
            .get(&target)
            .copied()
            .ok_or(VotesRepositoryError::TargetNotFound(target))
    }

    async fn commit(self: Box<Self>) -> Result<(), VotesRepositoryError> {
        let MemoryVoteTransaction { mut guard, staged, commit_failures } = *self;
        *guard = staged;
        match pop_failure(&commit_failures) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dropped_transaction_discards_changes() {
        let target = Target::post(1);
        let repository = MemoryVotesRepository::with_targets([target]);

        {
            let mut tx = repository.begin().await.unwrap();
            tx.insert_vote(&Vote::new(7, target, VoteType::Up)).await.unwrap();
            tx.apply_count_delta(target, 1).await.unwrap();
        }

        assert_eq!(repository.stored_count(target).await, Some(0));
        assert_eq!(repository.vote_rows(target).await, 0);
    }

    #[tokio::test]
    async fn test_committed_transaction_is_visible() {
        let target = Target::comment(3);
        let repository = MemoryVotesRepository::with_targets([target]);

        let mut tx = repository.begin().await.unwrap();
        tx.insert_vote(&Vote::new(7, target, VoteType::Down)).await.unwrap();
        assert_eq!(tx.apply_count_delta(target, -1).await.unwrap(), -1);
        tx.commit().await.unwrap();

        assert_eq!(repository.stored_count(target).await, Some(-1));
        let vote = repository.get_user_vote(7, target).await.unwrap().unwrap();
        assert_eq!(vote.vote_type, VoteType::Down);
    }

    #[tokio::test]
    async fn test_insert_rejects_unknown_target_and_duplicates() {
        let target = Target::post(1);
        let repository = MemoryVotesRepository::with_targets([target]);
        let mut tx = repository.begin().await.unwrap();

        let missing = tx.insert_vote(&Vote::new(7, Target::post(2), VoteType::Up)).await;
        assert!(matches!(missing, Err(VotesRepositoryError::TargetNotFound(t)) if t == Target::post(2)));

        tx.insert_vote(&Vote::new(7, target, VoteType::Up)).await.unwrap();
        let duplicate = tx.insert_vote(&Vote::new(7, target, VoteType::Down)).await;
        assert!(matches!(duplicate, Err(VotesRepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_queued_begin_failure_is_returned_once() {
        let repository = MemoryVotesRepository::new();
        repository.fail_next_begin(VotesRepositoryError::Unavailable("down".to_string()));

        assert!(matches!(repository.begin().await, Err(VotesRepositoryError::Unavailable(_))));
        assert!(repository.begin().await.is_ok());
        assert_eq!(repository.transactions_begun(), 2);
    }

    #[tokio::test]
    async fn test_failed_commit_still_applies_changes() {
        let target = Target::post(1);
        let repository = MemoryVotesRepository::with_targets([target]);
        repository.fail_next_commit(VotesRepositoryError::Unavailable("connection reset".to_string()));

        let mut tx = repository.begin().await.unwrap();
        tx.insert_vote(&Vote::new(7, target, VoteType::Up)).await.unwrap();
        tx.apply_count_delta(target, 1).await.unwrap();
        assert!(matches!(tx.commit().await, Err(VotesRepositoryError::Unavailable(_))));

        assert_eq!(repository.stored_count(target).await, Some(1));
        assert_eq!(repository.vote_rows(target).await, 1);

        let tx = repository.begin().await.unwrap();
        assert!(tx.commit().await.is_ok());
    }

    #[tokio::test]
    async fn test_repair_rewrites_drifted_counts() {
        let target = Target::post(5);
        let repository = MemoryVotesRepository::with_targets([target, Target::comment(5)]);
        repository.set_stored_count(target, 4).await;

        let drifts = repository.find_count_drifts(TargetKind::Post).await.unwrap();
        assert_eq!(drifts, vec![CountDrift { target, stored: 4, actual: 0 }]);
        assert!(repository.find_count_drifts(TargetKind::Comment).await.unwrap().is_empty());

        let repaired = repository.repair_count_drifts(TargetKind::Post).await.unwrap();
        assert_eq!(repaired.len(), 1);
        assert_eq!(repository.stored_count(target).await, Some(0));
        assert!(repository.find_count_drifts(TargetKind::Post).await.unwrap().is_empty());
    }
}

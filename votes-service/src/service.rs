//! Vote service implementation.
//!
//! This module provides the entry points the caller-facing layer uses to cast,
//! remove and read votes on posts and comments.
//!
//! # Consistency
//!
//! Each attempt of a mutating operation runs inside one `VoteTransaction`:
//!
//! 1. lock the caller's prior vote on the target (if any),
//! 2. resolve the request through `VoteState`,
//! 3. insert, flip or delete the vote row,
//! 4. add the transition's delta to the target's `vote_count` with a store-side
//!    increment, then commit.
//!
//! The counter is never read, adjusted in memory and written back, so concurrent
//! voters on the same target cannot overwrite each other's updates.
use std::future::Future;
use std::sync::Arc;

use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{info, instrument, warn};
use votes_repository::{VoteTransaction, VotesRepository, VotesRepositoryError};
use votes_shared::types::{
    CountDrift, Target, TargetId, TargetKind, UserId, Vote, VoteState, VoteSummary, VoteTransition,
    VoteType,
};

use crate::config::VoteServiceConfig;
use crate::errors::VoteError;

/// The main service for casting and reading votes.
///
/// `VoteService` is cheap to share: wrap it in an `Arc` and hand it to every
/// request handler. It holds no vote state of its own.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use votes_repository::PostgresVotesRepository;
/// use votes_service::VoteService;
/// use votes_shared::types::VoteType;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let repository = Arc::new(PostgresVotesRepository::new(pool).await?);
/// let service = VoteService::new(repository);
///
/// let summary = service.cast_post_vote(7, 42, VoteType::Up).await?;
/// assert_eq!(summary.user_vote, Some(VoteType::Up));
/// # Ok(())
/// # }
/// ```
pub struct VoteService {
    repository: Arc<dyn VotesRepository>,
    config: VoteServiceConfig,
}

impl VoteService {
    /// Create a new VoteService with default configuration.
    pub fn new(repository: Arc<dyn VotesRepository>) -> Self {
        Self {
            repository,
            config: VoteServiceConfig::default(),
        }
    }

    /// Create a new VoteService with custom configuration.
    pub fn with_config(repository: Arc<dyn VotesRepository>, config: VoteServiceConfig) -> Self {
        Self { repository, config }
    }

    /// Parses a raw vote direction as received from a client.
    ///
    /// # Returns
    ///
    /// * `Ok(VoteType)` - For `1` and `-1`
    /// * `Err(VoteError::Validation)` - For any other value
    pub fn parse_vote_type(raw: i16) -> Result<VoteType, VoteError> {
        VoteType::try_from(raw).map_err(|e| VoteError::validation(e.to_string()))
    }

    fn validate_user(user_id: UserId) -> Result<(), VoteError> {
        if user_id <= 0 {
            return Err(VoteError::validation(format!("user_id must be positive, got {}", user_id)));
        }
        Ok(())
    }

    fn validate_target(target: Target) -> Result<(), VoteError> {
        if target.id <= 0 {
            return Err(VoteError::validation(format!(
                "{}_id must be positive, got {}",
                target.kind, target.id
            )));
        }
        Ok(())
    }

    fn validate_batch_size(&self, size: usize) -> Result<(), VoteError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(VoteError::validation(format!(
                    "batch of {} targets exceeds maximum {}",
                    size, max
                )));
            }
        }
        Ok(())
    }

    /// Casts a vote on a post or comment.
    ///
    /// With no prior vote the vote is recorded; re-casting the held direction
    /// removes it (toggle-off); casting the opposite direction switches it.
    ///
    /// # Returns
    ///
    /// * `Ok(VoteSummary)` - The target's new `vote_count` and the caller's resulting vote
    /// * `Err(VoteError::Validation)` - Non-positive ids
    /// * `Err(VoteError::NotFound)` - The target does not exist
    /// * `Err(VoteError)` - Store failures left after retries
    #[instrument(skip(self), err)]
    pub async fn cast(
        &self,
        user_id: UserId,
        target: Target,
        vote_type: VoteType,
    ) -> Result<VoteSummary, VoteError> {
        Self::validate_user(user_id)?;
        Self::validate_target(target)?;

        self.with_retry("cast", || async move {
            let mut tx = self.repository.begin().await?;
            let existing = tx.lock_vote(user_id, target).await?;
            let state = VoteState::from(existing.as_ref().map(|vote| vote.vote_type));
            let transition = state.cast(vote_type);

            let vote_count = apply_transition(tx.as_mut(), user_id, target, existing, transition).await?;
            tx.commit().await.map_err(AttemptError::commit)?;

            let summary = VoteSummary {
                vote_count,
                user_vote: transition.resulting_state(state).vote_type(),
            };
            info!(?transition, delta = transition.delta(), vote_count, "Vote cast");
            Ok::<_, AttemptError>(summary)
        })
        .await
    }

    /// Like `cast`, taking the direction as a raw integer that must be `1` or `-1`.
    pub async fn cast_value(
        &self,
        user_id: UserId,
        target: Target,
        vote_type: i16,
    ) -> Result<VoteSummary, VoteError> {
        let vote_type = Self::parse_vote_type(vote_type)?;
        self.cast(user_id, target, vote_type).await
    }

    /// Removes the caller's vote on a post or comment.
    ///
    /// Removing a vote that does not exist succeeds without changing anything.
    ///
    /// # Returns
    ///
    /// * `Ok(VoteSummary)` - The target's `vote_count` with `user_vote` absent
    /// * `Err(VoteError::NotFound)` - The target does not exist
    #[instrument(skip(self), err)]
    pub async fn remove(&self, user_id: UserId, target: Target) -> Result<VoteSummary, VoteError> {
        Self::validate_user(user_id)?;
        Self::validate_target(target)?;

        self.with_retry("remove", || async move {
            let mut tx = self.repository.begin().await?;
            let existing = tx.lock_vote(user_id, target).await?;
            let state = VoteState::from(existing.as_ref().map(|vote| vote.vote_type));
            let transition = state.remove();

            let vote_count = apply_transition(tx.as_mut(), user_id, target, existing, transition).await?;
            tx.commit().await.map_err(AttemptError::commit)?;

            info!(?transition, delta = transition.delta(), vote_count, "Vote removed");
            Ok::<_, AttemptError>(VoteSummary { vote_count, user_vote: None })
        })
        .await
    }

    pub async fn cast_post_vote(
        &self,
        user_id: UserId,
        post_id: TargetId,
        vote_type: VoteType,
    ) -> Result<VoteSummary, VoteError> {
        self.cast(user_id, Target::post(post_id), vote_type).await
    }

    pub async fn cast_comment_vote(
        &self,
        user_id: UserId,
        comment_id: TargetId,
        vote_type: VoteType,
    ) -> Result<VoteSummary, VoteError> {
        self.cast(user_id, Target::comment(comment_id), vote_type).await
    }

    pub async fn remove_post_vote(&self, user_id: UserId, post_id: TargetId) -> Result<VoteSummary, VoteError> {
        self.remove(user_id, Target::post(post_id)).await
    }

    pub async fn remove_comment_vote(
        &self,
        user_id: UserId,
        comment_id: TargetId,
    ) -> Result<VoteSummary, VoteError> {
        self.remove(user_id, Target::comment(comment_id)).await
    }

    /// Returns the aggregate for one target, with the caller's vote when
    /// `user_id` is given.
    pub async fn summary(&self, user_id: Option<UserId>, target: Target) -> Result<VoteSummary, VoteError> {
        if let Some(user_id) = user_id {
            Self::validate_user(user_id)?;
        }
        Self::validate_target(target)?;

        let summaries = self
            .with_retry("summary", || async move {
                Ok::<_, AttemptError>(self.repository.get_vote_summaries(user_id, &[target]).await?)
            })
            .await?;

        summaries
            .into_iter()
            .next()
            .map(|(_, summary)| summary)
            .ok_or(VoteError::NotFound(target))
    }

    /// Returns the aggregate for each existing target, in input order.
    ///
    /// Targets that do not exist are left out of the result.
    pub async fn summaries(
        &self,
        user_id: Option<UserId>,
        targets: &[Target],
    ) -> Result<Vec<(Target, VoteSummary)>, VoteError> {
        self.validate_batch_size(targets.len())?;
        if let Some(user_id) = user_id {
            Self::validate_user(user_id)?;
        }
        for target in targets {
            Self::validate_target(*target)?;
        }

        self.with_retry("summaries", || async move {
            Ok::<_, AttemptError>(self.repository.get_vote_summaries(user_id, targets).await?)
        })
        .await
    }

    /// Returns the caller's current vote on a target.
    pub async fn user_vote(&self, user_id: UserId, target: Target) -> Result<Option<VoteType>, VoteError> {
        Self::validate_user(user_id)?;
        Self::validate_target(target)?;

        let vote = self
            .with_retry("user_vote", || async move {
                Ok::<_, AttemptError>(self.repository.get_user_vote(user_id, target).await?)
            })
            .await?;
        Ok(vote.map(|vote| vote.vote_type))
    }

    /// Lists targets of `kind` whose cached count disagrees with their votes.
    pub async fn audit(&self, kind: TargetKind) -> Result<Vec<CountDrift>, VoteError> {
        let drifts = self.repository.find_count_drifts(kind).await?;
        for drift in &drifts {
            warn!(
                target_kind = %kind,
                target_id = drift.target.id,
                stored = drift.stored,
                actual = drift.actual,
                "Vote count drift detected"
            );
        }
        info!(target_kind = %kind, drifted = drifts.len(), "Vote count audit finished");
        Ok(drifts)
    }

    /// Rewrites drifted counts of `kind` from the vote rows.
    pub async fn repair(&self, kind: TargetKind) -> Result<Vec<CountDrift>, VoteError> {
        Ok(self.repository.repair_count_drifts(kind).await?)
    }

    /// Runs `attempt` until it succeeds, fails permanently or exhausts retries.
    ///
    /// Conflicts are replayed immediately up to `conflict_retries` times.
    /// Transient failures are retried up to `transient_retries` times with
    /// jittered exponential backoff. A failed commit is never replayed: the
    /// transaction may already be durable, and replaying a cast against its
    /// own committed row would toggle the vote back off.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, VoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut conflicts_left = self.config.conflict_retries;
        let mut backoff = ExponentialBackoff::from_millis(self.config.retry_base_delay_ms)
            .max_delay(self.config.retry_max_delay)
            .map(jitter)
            .take(self.config.transient_retries);

        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(AttemptError::Commit(err)) => {
                    warn!(operation, error = %err, "Commit failed with unknown outcome, not retrying");
                    return Err(err);
                }
                Err(AttemptError::BeforeCommit(VoteError::Conflict(reason))) if conflicts_left > 0 => {
                    conflicts_left -= 1;
                    warn!(operation, %reason, "Conflicting vote write, retrying");
                }
                Err(AttemptError::BeforeCommit(VoteError::TransientStore(reason))) => match backoff.next() {
                    Some(delay) => {
                        warn!(operation, %reason, delay_ms = delay.as_millis() as u64, "Store unavailable, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(VoteError::TransientStore(reason)),
                },
                Err(AttemptError::BeforeCommit(err)) => return Err(err),
            }
        }
    }
}

/// How a single attempt inside `with_retry` failed.
enum AttemptError {
    /// Nothing was committed, so the attempt can be replayed.
    BeforeCommit(VoteError),
    /// `commit` itself failed and the transaction may or may not have landed.
    Commit(VoteError),
}

impl AttemptError {
    fn commit(err: VotesRepositoryError) -> Self {
        Self::Commit(err.into())
    }
}

impl From<VoteError> for AttemptError {
    fn from(err: VoteError) -> Self {
        Self::BeforeCommit(err)
    }
}

impl From<VotesRepositoryError> for AttemptError {
    fn from(err: VotesRepositoryError) -> Self {
        Self::BeforeCommit(err.into())
    }
}

/// Performs the row mutation for `transition` and applies its delta.
///
/// Returns the target's `vote_count` after the change.
async fn apply_transition(
    tx: &mut dyn VoteTransaction,
    user_id: UserId,
    target: Target,
    existing: Option<Vote>,
    transition: VoteTransition,
) -> Result<i32, VoteError> {
    let existing_id = existing.map(|vote| vote.vote_id);

    match (transition, existing_id) {
        (VoteTransition::Insert(vote_type), _) => {
            tx.insert_vote(&Vote::new(user_id, target, vote_type)).await?;
        }
        (VoteTransition::Flip(vote_type), Some(vote_id)) => {
            tx.update_vote_type(vote_id, vote_type).await?;
        }
        (VoteTransition::Delete(_), Some(vote_id)) => {
            tx.delete_vote(vote_id).await?;
        }
        (VoteTransition::Noop, _) => return Ok(tx.read_count(target).await?),
        (VoteTransition::Flip(_) | VoteTransition::Delete(_), None) => {
            return Err(VoteError::validation(format!(
                "{:?} requires an existing vote by user {} on {}",
                transition, user_id, target
            )));
        }
    }

    Ok(tx.apply_count_delta(target, transition.delta()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use votes_repository::MemoryVotesRepository;

    fn service_with(targets: &[Target]) -> (Arc<MemoryVotesRepository>, VoteService) {
        let repository = Arc::new(MemoryVotesRepository::with_targets(targets.iter().copied()));
        let service = VoteService::new(repository.clone());
        (repository, service)
    }

    #[test]
    fn test_parse_vote_type() {
        assert_eq!(VoteService::parse_vote_type(1).unwrap(), VoteType::Up);
        assert_eq!(VoteService::parse_vote_type(-1).unwrap(), VoteType::Down);
        assert!(matches!(VoteService::parse_vote_type(0), Err(VoteError::Validation(_))));
        assert!(matches!(VoteService::parse_vote_type(5), Err(VoteError::Validation(_))));
    }

    #[tokio::test]
    async fn test_apply_transition_rejects_flip_without_vote() {
        let target = Target::post(1);
        let (repository, _) = service_with(&[target]);
        let mut tx = repository.begin().await.unwrap();

        let result = apply_transition(tx.as_mut(), 7, target, None, VoteTransition::Flip(VoteType::Up)).await;
        assert!(matches!(result, Err(VoteError::Validation(_))));
    }

    #[tokio::test]
    async fn test_noop_reads_count_without_writing() {
        let target = Target::comment(1);
        let (repository, _) = service_with(&[target]);
        repository.set_stored_count(target, 5).await;
        let mut tx = repository.begin().await.unwrap();

        let vote_count = apply_transition(tx.as_mut(), 7, target, None, VoteTransition::Noop).await.unwrap();
        assert_eq!(vote_count, 5);
    }

    #[tokio::test]
    async fn test_summary_validates_ids() {
        let (_, service) = service_with(&[]);
        assert!(matches!(service.summary(Some(0), Target::post(1)).await, Err(VoteError::Validation(_))));
        assert!(matches!(service.summary(None, Target::post(-3)).await, Err(VoteError::Validation(_))));
    }

    #[tokio::test]
    async fn test_summaries_rejects_oversized_batch() {
        let repository = Arc::new(MemoryVotesRepository::new());
        let service = VoteService::with_config(repository.clone(), VoteServiceConfig::default().with_max_batch_size(2));
        let targets = [Target::post(1), Target::post(2), Target::post(3)];

        assert!(matches!(service.summaries(None, &targets).await, Err(VoteError::Validation(_))));
        assert!(service.summaries(None, &targets[..2]).await.unwrap().is_empty());
    }
}

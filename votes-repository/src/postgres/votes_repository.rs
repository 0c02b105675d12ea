//! PostgreSQL-backed vote storage.
//!
//! ## Key Features
//!
//! - Connection pooling with `sqlx::PgPool`
//! - Row-level locking of the prior vote (`SELECT ... FOR UPDATE`)
//! - Counter maintenance as a single `vote_count = vote_count + $delta` statement,
//!   resolved by the database and committed with the vote row mutation
//! - Batched aggregate lookups with `UNNEST`
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;
use votes_shared::types::{CountDrift, Target, TargetKind, UserId, Vote, VoteSummary, VoteType};

use crate::{VoteTransaction, VotesRepository, VotesRepositoryError};

const VOTE_COLUMNS: &str = "vote_id, user_id, post_id, comment_id, vote_type, created_at, updated_at";

/// PostgreSQL implementation of the votes repository.
pub struct PostgresVotesRepository {
    pool: sqlx::PgPool,
}

impl PostgresVotesRepository {
    /// Creates a new PostgreSQL repository instance.
    ///
    /// # Arguments
    ///
    /// * `pool` - Configured PostgreSQL connection pool
    ///
    /// # Returns
    ///
    /// * `Ok(PostgresVotesRepository)` - Ready-to-use repository instance
    /// * `Err(VotesRepositoryError)` - Reserved for future validation (currently always succeeds)
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, VotesRepositoryError> {
        Ok(Self { pool })
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), VotesRepositoryError> {
        sqlx::migrate!("src/postgres/migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Builds the aggregate-vs-rows comparison for every target of `kind`.
///
/// `SUM(smallint)` is `bigint` in PostgreSQL, hence the cast back to `INTEGER`.
fn drift_query(kind: TargetKind) -> String {
    format!(
        r#"
        SELECT t.id, t.vote_count, COALESCE(SUM(v.vote_type), 0)::INTEGER AS actual
        FROM {table} t
        LEFT JOIN votes v ON v.{column} = t.id
        GROUP BY t.id, t.vote_count
        HAVING t.vote_count <> COALESCE(SUM(v.vote_type), 0)
        ORDER BY t.id
        "#,
        table = kind.table(),
        column = kind.vote_column(),
    )
}

fn drift_from_row(kind: TargetKind, row: &PgRow) -> Result<CountDrift, VotesRepositoryError> {
    Ok(CountDrift {
        target: Target { kind, id: row.try_get("id")? },
        stored: row.try_get("vote_count")?,
        actual: row.try_get("actual")?,
    })
}

fn vote_type_from_db(raw: i16) -> Result<VoteType, VotesRepositoryError> {
    VoteType::try_from(raw).map_err(|e| VotesRepositoryError::InvalidVoteType(e.0))
}

fn vote_from_row(row: &PgRow) -> Result<Vote, VotesRepositoryError> {
    let vote_id: Uuid = row.try_get("vote_id")?;
    let post_id: Option<i64> = row.try_get("post_id")?;
    let comment_id: Option<i64> = row.try_get("comment_id")?;

    let target = match (post_id, comment_id) {
        (Some(id), None) => Target::post(id),
        (None, Some(id)) => Target::comment(id),
        _ => return Err(VotesRepositoryError::InvalidTargetReference(vote_id)),
    };

    Ok(Vote {
        vote_id,
        user_id: row.try_get("user_id")?,
        target,
        vote_type: vote_type_from_db(row.try_get("vote_type")?)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl VotesRepository for PostgresVotesRepository {
    async fn begin(&self) -> Result<Box<dyn VoteTransaction>, VotesRepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresVoteTransaction { tx }))
    }

    async fn get_user_vote(
        &self,
        user_id: UserId,
        target: Target,
    ) -> Result<Option<Vote>, VotesRepositoryError> {
        let sql = format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE user_id = $1 AND {column} = $2",
            column = target.kind.vote_column(),
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(target.id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(vote_from_row).transpose()
    }

    /// Looks up counts and the caller's votes with one `LEFT JOIN` per target kind,
    /// passing the ids as an array through `UNNEST`.
    async fn get_vote_summaries(
        &self,
        user_id: Option<UserId>,
        targets: &[Target],
    ) -> Result<Vec<(Target, VoteSummary)>, VotesRepositoryError> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let mut found = std::collections::HashMap::with_capacity(targets.len());
        for kind in [TargetKind::Post, TargetKind::Comment] {
            let ids: Vec<i64> = targets.iter().filter(|t| t.kind == kind).map(|t| t.id).collect();
            if ids.is_empty() {
                continue;
            }

            let sql = format!(
                r#"
                SELECT t.id, t.vote_count, v.vote_type
                FROM {table} t
                LEFT JOIN votes v ON v.{column} = t.id AND v.user_id = $2
                WHERE t.id IN (SELECT * FROM UNNEST($1::bigint[]))
                "#,
                table = kind.table(),
                column = kind.vote_column(),
            );
            let rows = sqlx::query(&sql)
                .bind(&ids)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

            for row in rows {
                let id: i64 = row.try_get("id")?;
                let user_vote = row
                    .try_get::<Option<i16>, _>("vote_type")?
                    .map(vote_type_from_db)
                    .transpose()?;
                let summary = VoteSummary { vote_count: row.try_get("vote_count")?, user_vote };
                found.insert(Target { kind, id }, summary);
            }
        }

        Ok(targets
            .iter()
            .filter_map(|target| found.get(target).map(|summary| (*target, *summary)))
            .collect())
    }

    async fn find_count_drifts(&self, kind: TargetKind) -> Result<Vec<CountDrift>, VotesRepositoryError> {
        let rows = sqlx::query(&drift_query(kind)).fetch_all(&self.pool).await?;
        rows.iter().map(|row| drift_from_row(kind, row)).collect()
    }

    /// Takes a `SHARE` lock on `votes` for the duration of the repair so that no
    /// vote mutation can commit between computing the sums and rewriting them.
    async fn repair_count_drifts(&self, kind: TargetKind) -> Result<Vec<CountDrift>, VotesRepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("LOCK TABLE votes IN SHARE MODE").execute(&mut *tx).await?;

        let rows = sqlx::query(&drift_query(kind)).fetch_all(&mut *tx).await?;
        let drifts = rows
            .iter()
            .map(|row| drift_from_row(kind, row))
            .collect::<Result<Vec<_>, _>>()?;

        let sql = format!("UPDATE {} SET vote_count = $1 WHERE id = $2", kind.table());
        for drift in &drifts {
            warn!(
                target_kind = %kind,
                target_id = drift.target.id,
                stored = drift.stored,
                actual = drift.actual,
                "Repairing drifted vote_count"
            );
            sqlx::query(&sql)
                .bind(drift.actual)
                .bind(drift.target.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(target_kind = %kind, repaired = drifts.len(), "Vote count repair finished");
        Ok(drifts)
    }

    async fn check_tables_created(&self) -> Result<bool, VotesRepositoryError> {
        for table in ["posts", "comments", "votes"] {
            let table_exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_name = $1)",
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?;
            if !table_exists {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A vote unit of work bound to one PostgreSQL transaction.
///
/// Dropping it without calling `commit` rolls the transaction back.
pub struct PostgresVoteTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl VoteTransaction for PostgresVoteTransaction {
    async fn lock_vote(
        &mut self,
        user_id: UserId,
        target: Target,
    ) -> Result<Option<Vote>, VotesRepositoryError> {
        let sql = format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE user_id = $1 AND {column} = $2 FOR UPDATE",
            column = target.kind.vote_column(),
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(target.id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(vote_from_row).transpose()
    }

    async fn insert_vote(&mut self, vote: &Vote) -> Result<(), VotesRepositoryError> {
        let (post_id, comment_id) = match vote.target.kind {
            TargetKind::Post => (Some(vote.target.id), None),
            TargetKind::Comment => (None, Some(vote.target.id)),
        };

        sqlx::query(
            r#"
            INSERT INTO votes (vote_id, user_id, post_id, comment_id, vote_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(vote.vote_id)
        .bind(vote.user_id)
        .bind(post_id)
        .bind(comment_id)
        .bind(i16::from(vote.vote_type))
        .bind(vote.created_at)
        .bind(vote.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| VotesRepositoryError::from(e).for_target(vote.target))?;
        Ok(())
    }

    async fn update_vote_type(
        &mut self,
        vote_id: Uuid,
        vote_type: VoteType,
    ) -> Result<(), VotesRepositoryError> {
        sqlx::query("UPDATE votes SET vote_type = $1, updated_at = NOW() WHERE vote_id = $2")
            .bind(i16::from(vote_type))
            .bind(vote_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_vote(&mut self, vote_id: Uuid) -> Result<(), VotesRepositoryError> {
        sqlx::query("DELETE FROM votes WHERE vote_id = $1")
            .bind(vote_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn apply_count_delta(&mut self, target: Target, delta: i32) -> Result<i32, VotesRepositoryError> {
        let sql = format!(
            "UPDATE {} SET vote_count = vote_count + $1 WHERE id = $2 RETURNING vote_count",
            target.kind.table(),
        );
        let vote_count: Option<i32> = sqlx::query_scalar(&sql)
            .bind(delta)
            .bind(target.id)
            .fetch_optional(&mut *self.tx)
            .await?;

        debug!(vote_target = %target, delta, ?vote_count, "Applied vote count delta");
        vote_count.ok_or(VotesRepositoryError::TargetNotFound(target))
    }

    async fn read_count(&mut self, target: Target) -> Result<i32, VotesRepositoryError> {
        let sql = format!("SELECT vote_count FROM {} WHERE id = $1", target.kind.table());
        let vote_count: Option<i32> = sqlx::query_scalar(&sql)
            .bind(target.id)
            .fetch_optional(&mut *self.tx)
            .await?;

        vote_count.ok_or(VotesRepositoryError::TargetNotFound(target))
    }

    async fn commit(self: Box<Self>) -> Result<(), VotesRepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}

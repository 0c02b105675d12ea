//! Dependency initialization and wiring for the votes binary.
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::time::sleep;
use tracing::{info, warn};
use votes_repository::{PostgresVotesRepository, VotesRepository};
use votes_service::VoteService;

use crate::config::VotesConfig;
use crate::errors::MaintenanceError;

/// Interval between checks while waiting for the schema to appear.
const TABLE_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub repository: Arc<PostgresVotesRepository>,
    pub service: VoteService,
}

impl Dependencies {
    /// Connects to PostgreSQL, prepares the schema and builds the service.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Connected and ready
    /// * `Err(MaintenanceError)` - The pool could not connect or migrations failed
    pub async fn new(config: &VotesConfig) -> Result<Self, MaintenanceError> {
        info!(
            max_connections = config.max_connections,
            acquire_timeout_secs = config.acquire_timeout.as_secs(),
            run_migrations = config.run_migrations,
            "Initializing dependencies"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await?;

        let repository = Arc::new(PostgresVotesRepository::new(pool).await?);

        if config.run_migrations {
            repository.migrate().await?;
            info!("Migrations applied");
        } else {
            Self::wait_for_tables(repository.as_ref()).await?;
        }

        let service = VoteService::with_config(repository.clone(), config.service.clone());

        Ok(Self { repository, service })
    }

    /// Polls until the vote tables exist.
    async fn wait_for_tables(repository: &dyn VotesRepository) -> Result<(), MaintenanceError> {
        while !repository.check_tables_created().await? {
            warn!(
                retry_interval_secs = TABLE_CHECK_INTERVAL.as_secs(),
                "Vote tables not created yet, waiting..."
            );
            sleep(TABLE_CHECK_INTERVAL).await;
        }
        Ok(())
    }
}

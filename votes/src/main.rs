//! Votes maintenance entry point.
//!
//! Connects to PostgreSQL, applies the votes schema and checks every post and
//! comment `vote_count` against its vote rows, repairing drift when asked to.

use std::env;

use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use votes::maintenance::{self, MaintenanceMode};
use votes::{Dependencies, MaintenanceError, VotesConfig};

/// Initialize tracing/logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("votes=info,votes_service=info,votes_repository=info"));

    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();
    }

    info!(
        service_name = "votes",
        service_version = env!("CARGO_PKG_VERSION"),
        json,
        "Tracing initialized"
    );
}

#[tokio::main]
async fn main() -> Result<(), MaintenanceError> {
    dotenv().ok();
    init_tracing();

    let config = VotesConfig::from_env()?;

    let deps = match Dependencies::new(&config).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let mode = MaintenanceMode::from_repair_flag(config.repair);
    match maintenance::run(&deps.service, mode).await {
        Ok(drifts) => {
            info!(?mode, drifted = drifts.len(), "Vote maintenance completed");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Vote maintenance failed");
            Err(e)
        }
    }
}

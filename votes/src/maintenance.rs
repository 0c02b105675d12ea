//! Count audit and repair across every target kind.
use tracing::{info, warn};
use votes_service::VoteService;
use votes_shared::types::{CountDrift, TargetKind};

use crate::errors::MaintenanceError;

/// Whether drift is only reported or also rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceMode {
    Audit,
    Repair,
}

impl MaintenanceMode {
    pub fn from_repair_flag(repair: bool) -> Self {
        if repair { Self::Repair } else { Self::Audit }
    }
}

/// Audits or repairs posts and then comments.
///
/// Returns every drift found, in that order. In `Repair` mode the returned
/// drifts have already been fixed.
pub async fn run(service: &VoteService, mode: MaintenanceMode) -> Result<Vec<CountDrift>, MaintenanceError> {
    let mut drifts = Vec::new();

    for kind in [TargetKind::Post, TargetKind::Comment] {
        let found = match mode {
            MaintenanceMode::Audit => service.audit(kind).await?,
            MaintenanceMode::Repair => service.repair(kind).await?,
        };
        info!(target_kind = %kind, ?mode, drifted = found.len(), "Vote counts checked");
        drifts.extend(found);
    }

    if !drifts.is_empty() && mode == MaintenanceMode::Audit {
        warn!(drifted = drifts.len(), "Vote counts drifted; rerun with VOTES_REPAIR=true to fix");
    }

    Ok(drifts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use votes_repository::MemoryVotesRepository;
    use votes_shared::types::{Target, VoteType};

    async fn drifted_service() -> (Arc<MemoryVotesRepository>, VoteService) {
        let repository = Arc::new(MemoryVotesRepository::with_targets([
            Target::post(1),
            Target::comment(2),
        ]));
        let service = VoteService::new(repository.clone());
        service.cast(7, Target::comment(2), VoteType::Down).await.unwrap();
        repository.set_stored_count(Target::post(1), 3).await;
        repository.set_stored_count(Target::comment(2), 0).await;
        (repository, service)
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(MaintenanceMode::from_repair_flag(true), MaintenanceMode::Repair);
        assert_eq!(MaintenanceMode::from_repair_flag(false), MaintenanceMode::Audit);
    }

    #[tokio::test]
    async fn test_audit_reports_without_fixing() {
        let (repository, service) = drifted_service().await;

        let drifts = run(&service, MaintenanceMode::Audit).await.unwrap();

        assert_eq!(
            drifts,
            vec![
                CountDrift { target: Target::post(1), stored: 3, actual: 0 },
                CountDrift { target: Target::comment(2), stored: 0, actual: -1 },
            ]
        );
        assert_eq!(repository.stored_count(Target::post(1)).await, Some(3));
    }

    #[tokio::test]
    async fn test_repair_fixes_all_kinds() {
        let (repository, service) = drifted_service().await;

        let drifts = run(&service, MaintenanceMode::Repair).await.unwrap();

        assert_eq!(drifts.len(), 2);
        assert_eq!(repository.stored_count(Target::post(1)).await, Some(0));
        assert_eq!(repository.stored_count(Target::comment(2)).await, Some(-1));
        assert!(run(&service, MaintenanceMode::Audit).await.unwrap().is_empty());
    }
}

//! Business logic services

pub mod audit;
pub mod catalog;
pub mod circulation;

use crate::{config::CirculationConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub circulation: circulation::CirculationService,
    pub audit: audit::AuditRecorder,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, circulation_config: CirculationConfig) -> Self {
        let audit = audit::AuditRecorder::new(repository.audit.clone());
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            circulation: circulation::CirculationService::new(
                repository,
                audit.clone(),
                circulation_config,
            ),
            audit,
        }
    }
}

use std::sync::Arc;

use crate::matching::pipeline::MatchPipeline;
use crate::persona::archive::PersonaArchive;
use crate::persona::sync::SyncCoordinator;
use crate::store::{ExclusionStore, JobStore, MatchStore, PersonaStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub personas: Arc<dyn PersonaStore>,
    pub jobs: Arc<dyn JobStore>,
    /// Redis-shadowed in production.
    pub matches: Arc<dyn MatchStore>,
    pub exclusions: Arc<dyn ExclusionStore>,
    pub pipeline: Arc<MatchPipeline>,
    pub sync: Arc<SyncCoordinator>,
    /// Best-effort persona snapshots; failures never fail a save.
    pub archive: Arc<dyn PersonaArchive>,
}

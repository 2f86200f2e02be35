//! Application state.

use kiln_core::RetryPolicy;
use kiln_db::{
    BuildRepo, ComponentRepo, LogRepo, MemoryBuildStore, MemoryCatalogStore, MemoryLogStore,
    PgBuildRepo, PgComponentRepo, PgLogRepo, PgTemplateRepo, TemplateRepo,
};
use kiln_engine::EngineRegistry;
use kiln_scheduler::{BuildQueue, MemoryBuildQueue, PgBuildQueue};
use sqlx::PgPool;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub builds: Arc<dyn BuildRepo>,
    pub logs: Arc<dyn LogRepo>,
    pub components: Arc<dyn ComponentRepo>,
    pub templates: Arc<dyn TemplateRepo>,
    pub queue: Arc<dyn BuildQueue>,
    pub engines: EngineRegistry,
    pub retry: RetryPolicy,
}

impl AppState {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            builds: Arc::new(PgBuildRepo::new(pool.clone())),
            logs: Arc::new(PgLogRepo::new(pool.clone())),
            components: Arc::new(PgComponentRepo::new(pool.clone())),
            templates: Arc::new(PgTemplateRepo::new(pool.clone())),
            queue: Arc::new(PgBuildQueue::new(pool)),
            engines: EngineRegistry::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// State backed by the in-memory stores. Nothing survives a restart.
    pub fn in_memory() -> Self {
        let builds = Arc::new(MemoryBuildStore::new());
        let catalog = Arc::new(MemoryCatalogStore::new());
        Self {
            builds: builds.clone(),
            logs: Arc::new(MemoryLogStore::new()),
            components: catalog.clone(),
            templates: catalog,
            queue: Arc::new(MemoryBuildQueue::new(builds)),
            engines: EngineRegistry::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

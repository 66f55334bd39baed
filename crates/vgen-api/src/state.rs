//! Application state.

use std::sync::Arc;

use vgen_genai::{GenerationBackend, VertexBackend};
use vgen_jobs::JobOrchestrator;
use vgen_media::{MergeConfig, MergePipeline};
use vgen_storage::{R2Client, StorageSink};
use vgen_store::JobStore;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: JobOrchestrator,
    pub merger: MergePipeline,
    pub backend: Arc<dyn GenerationBackend>,
    pub store: JobStore,
    pub storage: Arc<dyn StorageSink>,
}

impl AppState {
    /// Create new application state from the environment.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let store = JobStore::from_env()?;
        let backend: Arc<dyn GenerationBackend> = Arc::new(VertexBackend::from_env().await?);
        let storage: Arc<dyn StorageSink> = Arc::new(R2Client::from_env()?);

        Ok(Self::from_parts(
            config,
            store,
            backend,
            storage,
            MergeConfig::from_env(),
        ))
    }

    /// Assemble state from already-built components.
    pub fn from_parts(
        config: ApiConfig,
        store: JobStore,
        backend: Arc<dyn GenerationBackend>,
        storage: Arc<dyn StorageSink>,
        merge_config: MergeConfig,
    ) -> Self {
        let orchestrator = JobOrchestrator::new(store.clone(), backend.clone());
        let merger = MergePipeline::new(storage.clone(), merge_config);

        Self {
            config,
            orchestrator,
            merger,
            backend,
            store,
            storage,
        }
    }
}

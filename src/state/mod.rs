use std::sync::Arc;

use serde_json::Value;

use crate::core::config::{
    AgentSettings, AppPaths, ConfigService, LlmSettings, RetrievalSettings, ServerSettings,
    StorageSettings,
};
use crate::graph::build_turn_graph;
use crate::history::HistoryStore;
use crate::llm::{build_provider, LlmProvider, LlmService};
use crate::pipeline::{OrchestratorRegistry, PipelineServices};
use crate::rag::{EmbeddingIndex, RetrievalEngine, SqliteChunkStore, VectorIndex};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// Contains references to:
/// - Configuration and paths
/// - The history database (turns and agent sessions)
/// - The LLM service and the law index
/// - The per-user orchestrators
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub server: ServerSettings,
    pub history: HistoryStore,
    pub llm: LlmService,
    pub index: Arc<dyn VectorIndex>,
    pub retrieval: RetrievalEngine,
    pub pipeline: Arc<OrchestratorRegistry>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Setting up paths and loading configuration
    /// 2. Opening the history and index databases
    /// 3. Connecting the configured LLM provider
    /// 4. Building the turn graph and the orchestrator registry
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());
        let loaded = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let provider = build_provider(&LlmSettings::from_config(&loaded))
            .map_err(|e| InitializationError::Llm(e.into()))?;

        Self::assemble(paths, config, &loaded, provider).await
    }

    /// Same as `initialize`, with the language model supplied by the caller.
    pub async fn with_provider(
        paths: Arc<AppPaths>,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let loaded = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;

        Self::assemble(paths, config, &loaded, provider).await
    }

    async fn assemble(
        paths: Arc<AppPaths>,
        config: ConfigService,
        loaded: &Value,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Arc<Self>, InitializationError> {
        let server = ServerSettings::from_config(loaded);
        let storage = StorageSettings::from_config(loaded);
        let retrieval_settings = RetrievalSettings::from_config(loaded);
        let agent_settings = AgentSettings::from_config(loaded);
        let llm = LlmService::new(provider, LlmSettings::from_config(loaded));

        let history = HistoryStore::new(paths.resolve_data_path(&storage.history_db))
            .await
            .map_err(|e| InitializationError::History(e.into()))?;

        let chunk_store = Arc::new(
            SqliteChunkStore::with_path(paths.resolve_data_path(&storage.index_db))
                .await
                .map_err(|e| InitializationError::Index(e.into()))?,
        );
        let index: Arc<dyn VectorIndex> = Arc::new(EmbeddingIndex::new(llm.clone(), chunk_store));

        let graph = Arc::new(build_turn_graph().map_err(|e| InitializationError::Graph(e.into()))?);
        let history_handle = Arc::new(history.clone());
        let services = Arc::new(PipelineServices::new(
            llm.clone(),
            history_handle.clone(),
            history_handle,
            index.clone(),
            retrieval_settings,
            agent_settings,
        ));
        let retrieval = services.retrieval.clone();
        let pipeline = Arc::new(OrchestratorRegistry::new(services, graph));

        tracing::info!(
            provider = llm.provider_name(),
            chat_model = %llm.settings().chat_model,
            data_dir = %paths.user_data_dir.display(),
            "Application state initialized"
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            server,
            history,
            llm,
            index,
            retrieval,
            pipeline,
        }))
    }
}

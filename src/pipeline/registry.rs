use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::orchestrator::{Orchestrator, TurnStream};
use super::services::PipelineServices;
use crate::core::errors::ApiError;
use crate::graph::GraphRuntime;
use crate::rag::MetadataFilter;

/// One orchestrator per username, created on first use.
pub struct OrchestratorRegistry {
    services: Arc<PipelineServices>,
    graph: Arc<GraphRuntime>,
    orchestrators: Mutex<HashMap<String, Arc<Orchestrator>>>,
}

impl OrchestratorRegistry {
    pub fn new(services: Arc<PipelineServices>, graph: Arc<GraphRuntime>) -> Self {
        Self {
            services,
            graph,
            orchestrators: Mutex::new(HashMap::new()),
        }
    }

    pub fn services(&self) -> &Arc<PipelineServices> {
        &self.services
    }

    pub async fn get(&self, username: &str) -> Arc<Orchestrator> {
        let mut orchestrators = self.orchestrators.lock().await;
        orchestrators
            .entry(username.to_string())
            .or_insert_with(|| {
                Arc::new(Orchestrator::new(
                    username,
                    self.services.clone(),
                    self.graph.clone(),
                ))
            })
            .clone()
    }

    pub async fn run(&self, query: &str, username: &str) -> TurnStream {
        self.run_with_filter(query, username, None).await
    }

    pub async fn run_with_filter(
        &self,
        query: &str,
        username: &str,
        filter: Option<MetadataFilter>,
    ) -> TurnStream {
        self.get(username).await.run_with_filter(query, filter)
    }

    /// Deletes the user's history; their next turn starts a new answering
    /// session. The orchestrator stays registered so its turn lock keeps
    /// serializing the user's turns.
    pub async fn delete_history(&self, username: &str) -> Result<usize, ApiError> {
        let orchestrator = self.orchestrators.lock().await.get(username).cloned();
        match orchestrator {
            Some(orchestrator) => orchestrator.delete_history().await,
            None => self.services.turns.delete_turns(username).await,
        }
    }
}

//! Per-user turn orchestration.
//!
//! `run` starts the stage graph on its own task and hands back a
//! `TurnStream`: events arrive in emission order, and `finish` yields the
//! completed `TurnRecord`. Nothing is persisted until `save_history` is
//! called with that record, so an abandoned or failed turn leaves no row.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex};

use super::events::TurnEvent;
use super::services::PipelineServices;
use crate::agent::SessionId;
use crate::core::errors::ApiError;
use crate::graph::{GraphRuntime, NodeContext, TurnStage, TurnState};
use crate::history::NewTurn;
use crate::rag::MetadataFilter;

// Small so that generation stays close to what the consumer has taken.
const EVENT_BUFFER: usize = 4;

/// A turn that reached `Done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnRecord {
    pub username: String,
    pub user_query: String,
    pub keyword: String,
    pub search_results: String,
    pub origin_agent_response: String,
    pub final_agent_response: String,
}

impl TurnRecord {
    fn from_state(state: TurnState) -> Self {
        Self {
            username: state.username,
            user_query: state.query,
            keyword: state.keyword,
            search_results: state.search_results,
            origin_agent_response: state.origin_response,
            final_agent_response: state.final_response,
        }
    }

    pub fn to_new_turn(&self) -> NewTurn {
        NewTurn {
            username: self.username.clone(),
            user_query: self.user_query.clone(),
            search_results: self.search_results.clone(),
            origin_agent_response: self.origin_agent_response.clone(),
            final_agent_response: self.final_agent_response.clone(),
        }
    }
}

/// Output of one turn. Finite and not restartable.
pub struct TurnStream {
    events: mpsc::Receiver<TurnEvent>,
    done: oneshot::Receiver<Result<TurnRecord, ApiError>>,
}

impl TurnStream {
    pub async fn next(&mut self) -> Option<TurnEvent> {
        self.events.recv().await
    }

    /// Drains any unread events and waits for the outcome.
    pub async fn finish(mut self) -> Result<TurnRecord, ApiError> {
        while self.events.recv().await.is_some() {}
        self.done
            .await
            .map_err(|_| ApiError::internal("turn ended without an outcome"))?
    }
}

pub struct Orchestrator {
    username: String,
    services: Arc<PipelineServices>,
    graph: Arc<GraphRuntime>,
    /// Held for the whole of a turn. Guards the answering session, which
    /// `delete_history` replaces.
    answer_session: Arc<Mutex<SessionId>>,
}

impl Orchestrator {
    pub fn new(
        username: impl Into<String>,
        services: Arc<PipelineServices>,
        graph: Arc<GraphRuntime>,
    ) -> Self {
        Self {
            username: username.into(),
            services,
            graph,
            answer_session: Arc::new(Mutex::new(SessionId::new())),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The current answering session; waits for a running turn.
    pub async fn answer_session(&self) -> SessionId {
        self.answer_session.lock().await.clone()
    }

    pub fn run(&self, query: &str) -> TurnStream {
        self.run_with_filter(query, None)
    }

    /// Starts a turn. Turns of the same user queue behind each other.
    pub fn run_with_filter(&self, query: &str, filter: Option<MetadataFilter>) -> TurnStream {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (done_tx, done_rx) = oneshot::channel();

        let services = self.services.clone();
        let graph = self.graph.clone();
        let session = self.answer_session.clone();
        let username = self.username.clone();
        let query = query.to_string();

        tokio::spawn(async move {
            let session = session.lock_owned().await;
            let mut state = TurnState::new(username, query, filter, session.clone());
            tracing::info!(username = %state.username, "Turn started");

            let result = {
                let mut ctx = NodeContext::new(&services, &events_tx);
                graph.run(&mut state, &mut ctx).await
            };
            // Close the event stream before reporting the outcome.
            drop(events_tx);

            let outcome = match result {
                Ok(()) if state.stage == TurnStage::Done => {
                    tracing::info!(username = %state.username, "Turn completed");
                    Ok(TurnRecord::from_state(state))
                }
                Ok(()) => Err(ApiError::internal(format!(
                    "turn stopped in stage {}",
                    state.stage.as_str()
                ))),
                Err(err) => {
                    state.advance(TurnStage::Failed);
                    if err.is_cancelled() {
                        tracing::info!(username = %state.username, "Turn abandoned by consumer");
                    } else {
                        tracing::error!(username = %state.username, "Turn failed: {}", err);
                    }
                    Err(ApiError::from(err))
                }
            };
            let _ = done_tx.send(outcome);
        });

        TurnStream {
            events: events_rx,
            done: done_rx,
        }
    }

    /// Persists a completed turn.
    pub async fn save_history(&self, record: &TurnRecord) -> Result<i64, ApiError> {
        let id = self.services.turns.insert_turn(record.to_new_turn()).await?;
        tracing::debug!(username = %record.username, id, "Turn saved");
        Ok(id)
    }

    /// Removes the user's turns and the answering agent's session history,
    /// after any running turn has ended. Later turns use a new session.
    pub async fn delete_history(&self) -> Result<usize, ApiError> {
        let mut session = self.answer_session.lock().await;
        let deleted = self.services.turns.delete_turns(&self.username).await?;
        self.services.answer_agent.delete_history(&session).await?;
        *session = SessionId::new();
        Ok(deleted)
    }
}

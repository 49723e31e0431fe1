// Node trait and types
// Base abstraction for turn pipeline stages

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::errors::ApiError;
use crate::pipeline::{PipelineServices, TurnEvent};

use super::state::TurnState;

/// Context passed to nodes during execution
pub struct NodeContext<'a> {
    /// Agents, retrieval and stores shared by every turn
    pub services: &'a PipelineServices,
    /// Ordered output towards the turn's consumer
    pub events: &'a mpsc::Sender<TurnEvent>,
}

impl<'a> NodeContext<'a> {
    pub fn new(services: &'a PipelineServices, events: &'a mpsc::Sender<TurnEvent>) -> Self {
        Self { services, events }
    }

    /// Forward an event to the consumer. Fails once the consumer is gone so
    /// the stage stops generating.
    pub async fn emit(&self, node_id: &str, event: TurnEvent) -> Result<(), GraphError> {
        self.events
            .send(event)
            .await
            .map_err(|_| GraphError::cancelled(node_id))
    }
}

/// Output from a node execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutput {
    /// Follow the node's outgoing edge
    Continue,
    /// Graph execution complete
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphErrorKind {
    Internal,
    /// The language model could not be reached or failed mid-generation.
    ModelUnavailable,
    /// The consumer stopped listening.
    Cancelled,
}

/// Graph execution error
///
/// Includes an `execution_trace` recording the node IDs visited before the
/// error occurred.
#[derive(Debug, Clone)]
pub struct GraphError {
    pub node_id: String,
    pub message: String,
    pub kind: GraphErrorKind,
    /// Ordered list of node IDs executed before this error, most-recent last.
    pub execution_trace: Vec<String>,
}

impl GraphError {
    pub fn new(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            message: message.into(),
            kind: GraphErrorKind::Internal,
            execution_trace: Vec::new(),
        }
    }

    pub fn cancelled(node_id: impl Into<String>) -> Self {
        Self {
            kind: GraphErrorKind::Cancelled,
            ..Self::new(node_id, "consumer disconnected")
        }
    }

    /// Wraps a service error, keeping track of model outages.
    pub fn from_api(node_id: impl Into<String>, err: ApiError) -> Self {
        let kind = if err.is_model_unavailable() {
            GraphErrorKind::ModelUnavailable
        } else {
            GraphErrorKind::Internal
        };
        Self {
            kind,
            ..Self::new(node_id, err.to_string())
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == GraphErrorKind::Cancelled
    }

    pub fn with_trace(mut self, trace: &[String]) -> Self {
        self.execution_trace = trace.to_vec();
        self
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        let message = if err.execution_trace.is_empty() {
            format!("{} failed: {}", err.node_id, err.message)
        } else {
            format!(
                "{} failed (trace: {}): {}",
                err.node_id,
                err.execution_trace.join(" -> "),
                err.message
            )
        };
        match err.kind {
            GraphErrorKind::ModelUnavailable => ApiError::ModelUnavailable(message),
            GraphErrorKind::Internal | GraphErrorKind::Cancelled => ApiError::Internal(message),
        }
    }
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.execution_trace.is_empty() {
            write!(f, "GraphError in {}: {}", self.node_id, self.message)
        } else {
            write!(
                f,
                "GraphError in {} (trace: {}): {}",
                self.node_id,
                self.execution_trace.join(" -> "),
                self.message
            )
        }
    }
}

impl std::error::Error for GraphError {}

/// Node trait - every pipeline stage implements this
#[async_trait]
pub trait Node: Send + Sync {
    /// Unique identifier for this node
    fn id(&self) -> &'static str;

    /// Human-readable name for logs
    fn name(&self) -> &'static str {
        self.id()
    }

    /// Execute the node logic
    async fn execute(
        &self,
        state: &mut TurnState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_outage_survives_conversion() {
        let err = GraphError::from_api("answer", ApiError::model_unavailable("connection refused"))
            .with_trace(&["keyword".to_string(), "retrieve".to_string()]);
        let api: ApiError = err.into();
        assert!(api.is_model_unavailable());
        assert!(api.to_string().contains("keyword -> retrieve"));
    }

    #[test]
    fn other_failures_are_internal() {
        let api: ApiError = GraphError::from_api("retrieve", ApiError::persistence("locked")).into();
        assert!(matches!(api, ApiError::Internal(_)));
        assert!(GraphError::cancelled("answer").is_cancelled());
    }
}

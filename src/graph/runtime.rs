// Graph Runtime - petgraph based
// Runs the turn stages in edge order

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

use super::node::{GraphError, Node, NodeContext, NodeOutput};
use super::state::TurnState;

/// petgraph-based stage graph. Every node has at most one outgoing edge.
pub struct GraphRuntime {
    graph: DiGraph<Box<dyn Node>, ()>,
    /// Map from node ID to NodeIndex for lookup
    node_indices: HashMap<String, NodeIndex>,
    entry_node_id: String,
    /// Maximum execution steps (recursion limit)
    max_steps: usize,
}

impl GraphRuntime {
    fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            entry_node_id: String::new(),
            max_steps: 16,
        }
    }

    fn add_node(&mut self, node: Box<dyn Node>) {
        let id = node.id().to_string();
        let index = self.graph.add_node(node);
        self.node_indices.insert(id, index);
    }

    fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let from_idx = *self
            .node_indices
            .get(from)
            .ok_or_else(|| GraphError::new(from, format!("Source node not found: {}", from)))?;
        let to_idx = *self
            .node_indices
            .get(to)
            .ok_or_else(|| GraphError::new(to, format!("Target node not found: {}", to)))?;

        if self
            .graph
            .neighbors_directed(from_idx, Direction::Outgoing)
            .next()
            .is_some()
        {
            return Err(GraphError::new(
                from,
                format!("Node already has an outgoing edge: {}", from),
            ));
        }

        self.graph.add_edge(from_idx, to_idx, ());
        Ok(())
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.node_indices.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Execute the graph. A failing node's error carries the ids of the
    /// nodes that ran before it.
    pub async fn run(
        &self,
        state: &mut TurnState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), GraphError> {
        let mut current_idx = *self.node_indices.get(&self.entry_node_id).ok_or_else(|| {
            GraphError::new(
                "runtime",
                format!("Entry node not found: {}", self.entry_node_id),
            )
        })?;

        let mut trace: Vec<String> = Vec::new();

        for step in 0..self.max_steps {
            let node = self
                .graph
                .node_weight(current_idx)
                .ok_or_else(|| GraphError::new("runtime", "Node not found in graph"))?;

            let node_id = node.id();
            tracing::debug!("Executing node: {} (step {})", node.name(), step);

            let output = node
                .execute(state, ctx)
                .await
                .map_err(|err| err.with_trace(&trace))?;
            trace.push(node_id.to_string());

            match output {
                NodeOutput::Final => {
                    tracing::debug!("Graph execution complete at node: {}", node_id);
                    return Ok(());
                }
                NodeOutput::Continue => {
                    current_idx = self
                        .graph
                        .neighbors_directed(current_idx, Direction::Outgoing)
                        .next()
                        .ok_or_else(|| {
                            GraphError::new(
                                node_id,
                                format!("No outgoing edge from node: {}", node_id),
                            )
                            .with_trace(&trace)
                        })?;
                }
            }
        }

        Err(GraphError::new(
            "runtime",
            format!("Maximum steps ({}) exceeded", self.max_steps),
        )
        .with_trace(&trace))
    }
}

/// Builder for constructing graphs fluently
pub struct GraphBuilder {
    runtime: GraphRuntime,
    pending_edges: Vec<(String, String)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            runtime: GraphRuntime::new(),
            pending_edges: Vec::new(),
        }
    }

    pub fn entry(mut self, node_id: impl Into<String>) -> Self {
        self.runtime.entry_node_id = node_id.into();
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.runtime.max_steps = max_steps;
        self
    }

    pub fn node(mut self, node: Box<dyn Node>) -> Self {
        self.runtime.add_node(node);
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.pending_edges.push((from.into(), to.into()));
        self
    }

    pub fn build(mut self) -> Result<GraphRuntime, GraphError> {
        for (from, to) in std::mem::take(&mut self.pending_edges) {
            self.runtime.add_edge(&from, &to)?;
        }
        if !self.runtime.node_indices.contains_key(&self.runtime.entry_node_id) {
            return Err(GraphError::new(
                "runtime",
                format!("Entry node not found: {}", self.runtime.entry_node_id),
            ));
        }
        Ok(self.runtime)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct Stub(&'static str);

    #[async_trait]
    impl Node for Stub {
        fn id(&self) -> &'static str {
            self.0
        }

        async fn execute(
            &self,
            _state: &mut TurnState,
            _ctx: &mut NodeContext<'_>,
        ) -> Result<NodeOutput, GraphError> {
            Ok(NodeOutput::Final)
        }
    }

    #[test]
    fn build_rejects_unknown_edge_targets() {
        let result = GraphBuilder::new()
            .entry("a")
            .node(Box::new(Stub("a")))
            .edge("a", "b")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn build_rejects_branching() {
        let result = GraphBuilder::new()
            .entry("a")
            .node(Box::new(Stub("a")))
            .node(Box::new(Stub("b")))
            .node(Box::new(Stub("c")))
            .edge("a", "b")
            .edge("a", "c")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn build_requires_entry() {
        let result = GraphBuilder::new().node(Box::new(Stub("a"))).build();
        assert!(result.is_err());
    }
}

// Graph Builder
// Constructs the turn pipeline graph using petgraph

use super::node::GraphError;
use super::nodes::{AnswerNode, KeywordNode, RetrieveNode, SummarizeNode};
use super::runtime::{GraphBuilder, GraphRuntime};

/// keyword -> retrieve -> answer -> summarize, strictly sequential.
pub fn build_turn_graph() -> Result<GraphRuntime, GraphError> {
    GraphBuilder::new()
        .entry("keyword")
        .max_steps(8)
        .node(Box::new(KeywordNode::new()))
        .node(Box::new(RetrieveNode::new()))
        .node(Box::new(AnswerNode::new()))
        .node(Box::new(SummarizeNode::new()))
        .edge("keyword", "retrieve")
        .edge("retrieve", "answer")
        .edge("answer", "summarize")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_graph_is_a_chain() {
        let graph = build_turn_graph().unwrap();
        let mut ids = graph.node_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec!["answer", "keyword", "retrieve", "summarize"]);
        assert!(!graph.has_cycle());
    }
}

// Retrieve Node
// Keyword search, bucket merge, and the retrieval payload event

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::{TurnStage, TurnState};
use crate::pipeline::TurnEvent;
use crate::rag::RetrievalResult;

pub struct RetrieveNode;

impl RetrieveNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RetrieveNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for RetrieveNode {
    fn id(&self) -> &'static str {
        "retrieve"
    }

    fn name(&self) -> &'static str {
        "Law Retrieval"
    }

    async fn execute(
        &self,
        state: &mut TurnState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        state.advance(TurnStage::Retrieving);

        // A failed lookup is treated as "nothing found"; the answer stage
        // falls back to general knowledge.
        let found = match ctx
            .services
            .retrieval
            .search(&state.keyword, state.filter.as_ref())
            .await
        {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(keyword = %state.keyword, "Retrieval failed, continuing without context: {}", err);
                RetrievalResult::default()
            }
        };

        let merged = ctx.services.merge.apply(&found);
        state.search_results = merged.to_payload();
        state.retrieval = merged;

        ctx.emit(
            self.id(),
            TurnEvent::Retrieval {
                keyword: state.keyword.clone(),
                payload: state.search_results.clone(),
            },
        )
        .await?;

        Ok(NodeOutput::Continue)
    }
}

// Keyword Node
// Asks the query agent for the single search term of the user's question

use async_trait::async_trait;

use crate::agent::markers::normalize_keyword;
use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::{TurnStage, TurnState};

pub struct KeywordNode;

impl KeywordNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KeywordNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for KeywordNode {
    fn id(&self) -> &'static str {
        "keyword"
    }

    fn name(&self) -> &'static str {
        "Keyword Extraction"
    }

    async fn execute(
        &self,
        state: &mut TurnState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        state.advance(TurnStage::ExtractingKeyword);

        let raw = ctx
            .services
            .query_agent
            .invoke(&state.query)
            .await
            .map_err(|e| GraphError::from_api(self.id(), e))?;

        state.keyword = normalize_keyword(&raw, &ctx.services.agent_settings.reasoning_delimiter);
        if state.keyword.is_empty() {
            tracing::info!(username = %state.username, "No usable keyword extracted");
        } else {
            tracing::info!(username = %state.username, keyword = %state.keyword, "Keyword extracted");
        }

        Ok(NodeOutput::Continue)
    }
}

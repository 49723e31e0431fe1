// Summarize Node
// A fresh summarizing agent condenses the visible part of the answer

use async_trait::async_trait;

use crate::agent::markers::after_reasoning;
use crate::agent::SessionId;
use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::{TurnStage, TurnState};
use crate::pipeline::TurnEvent;

pub struct SummarizeNode;

impl SummarizeNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SummarizeNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for SummarizeNode {
    fn id(&self) -> &'static str {
        "summarize"
    }

    fn name(&self) -> &'static str {
        "Summary"
    }

    async fn execute(
        &self,
        state: &mut TurnState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        state.advance(TurnStage::Summarizing);
        ctx.emit(self.id(), TurnEvent::SummaryStart).await?;

        let input = after_reasoning(
            &state.origin_response,
            &ctx.services.agent_settings.reasoning_delimiter,
        );
        let agent = ctx.services.summarizing_agent();
        let session = SessionId::new();

        let mut stream = agent
            .stream_ask(&session, &input)
            .await
            .map_err(|e| GraphError::from_api(self.id(), e))?;

        while let Some(item) = stream.next().await {
            let fragment = item.map_err(|e| GraphError::from_api(self.id(), e))?;
            if fragment.is_empty() {
                continue;
            }
            ctx.emit(self.id(), TurnEvent::Summary(fragment)).await?;
        }

        state.final_response = stream
            .finish()
            .await
            .map_err(|e| GraphError::from_api(self.id(), e))?;

        state.advance(TurnStage::Done);
        Ok(NodeOutput::Final)
    }
}

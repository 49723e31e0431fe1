// Answer Node
// Streams the grounded answer with the previous turn and retrieved law text

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::{TurnStage, TurnState};
use crate::history::ConversationTurn;
use crate::pipeline::TurnEvent;
use crate::rag::merge::render_context;

const NONE_MARKER: &str = "无";

pub struct AnswerNode;

impl AnswerNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnswerNode {
    fn default() -> Self {
        Self::new()
    }
}

/// The structured input of the answering agent.
pub fn compose_answer_input(prior: Option<&ConversationTurn>, context: &str, query: &str) -> String {
    let history = prior
        .map(|turn| {
            format!(
                "用户：{}\n回答：{}",
                turn.user_query, turn.final_agent_response
            )
        })
        .unwrap_or_else(|| NONE_MARKER.to_string());
    let context = if context.trim().is_empty() {
        NONE_MARKER
    } else {
        context
    };

    format!("上一轮对话：\n{history}\n\n检索到的法律条文：\n{context}\n\n用户问题：{query}")
}

#[async_trait]
impl Node for AnswerNode {
    fn id(&self) -> &'static str {
        "answer"
    }

    fn name(&self) -> &'static str {
        "Grounded Answer"
    }

    async fn execute(
        &self,
        state: &mut TurnState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        state.advance(TurnStage::Answering);

        state.prior_turn = match ctx.services.turns.latest_turn(&state.username).await {
            Ok(turn) => turn,
            Err(err) => {
                tracing::warn!(username = %state.username, "Failed to read previous turn: {}", err);
                None
            }
        };

        let input = compose_answer_input(
            state.prior_turn.as_ref(),
            &render_context(&state.retrieval),
            &state.query,
        );

        let mut stream = ctx
            .services
            .answer_agent
            .stream_ask(&state.answer_session, &input)
            .await
            .map_err(|e| GraphError::from_api(self.id(), e))?;

        while let Some(item) = stream.next().await {
            let fragment = item.map_err(|e| GraphError::from_api(self.id(), e))?;
            if fragment.is_empty() {
                continue;
            }
            ctx.emit(self.id(), TurnEvent::Answer(fragment)).await?;
        }

        state.origin_response = stream
            .finish()
            .await
            .map_err(|e| GraphError::from_api(self.id(), e))?;

        Ok(NodeOutput::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_turn_without_context() {
        let input = compose_answer_input(None, "", "试用期最多可以约定多久");
        assert_eq!(
            input,
            "上一轮对话：\n无\n\n检索到的法律条文：\n无\n\n用户问题：试用期最多可以约定多久"
        );
    }

    #[test]
    fn prior_turn_uses_the_final_response() {
        let prior = ConversationTurn {
            id: 1,
            username: "admin".to_string(),
            timestamp: "2026-01-01T00:00:00.000000Z".to_string(),
            user_query: "什么是试用期".to_string(),
            search_results: "[[],[]]".to_string(),
            origin_agent_response: "很长的回答".to_string(),
            final_agent_response: "简短总结".to_string(),
        };
        let input = compose_answer_input(Some(&prior), "【劳动合同法 第十九条】……", "那工资呢");
        assert!(input.contains("用户：什么是试用期\n回答：简短总结"));
        assert!(!input.contains("很长的回答"));
        assert!(input.contains("【劳动合同法 第十九条】"));
        assert!(input.ends_with("用户问题：那工资呢"));
    }
}

use std::sync::Arc;

use crate::agent::{AgentProfile, ConversationAgent};
use crate::core::config::{AgentSettings, RetrievalSettings};
use crate::history::{MessageStore, TurnStore};
use crate::llm::LlmService;
use crate::rag::{MergePolicy, RetrievalEngine, VectorIndex};

/// Everything a turn needs, shared by all users' orchestrators.
pub struct PipelineServices {
    pub llm: LlmService,
    pub messages: Arc<dyn MessageStore>,
    pub turns: Arc<dyn TurnStore>,
    pub retrieval: RetrievalEngine,
    pub merge: MergePolicy,
    pub agent_settings: AgentSettings,
    pub query_agent: ConversationAgent,
    pub answer_agent: ConversationAgent,
}

impl PipelineServices {
    pub fn new(
        llm: LlmService,
        messages: Arc<dyn MessageStore>,
        turns: Arc<dyn TurnStore>,
        index: Arc<dyn VectorIndex>,
        retrieval_settings: RetrievalSettings,
        agent_settings: AgentSettings,
    ) -> Self {
        let query_agent = ConversationAgent::new(
            llm.clone(),
            messages.clone(),
            AgentProfile::query(&agent_settings),
            agent_settings.history_window,
        );
        let answer_agent = ConversationAgent::new(
            llm.clone(),
            messages.clone(),
            AgentProfile::answer(&agent_settings),
            agent_settings.history_window,
        );

        Self {
            llm,
            messages,
            turns,
            retrieval: RetrievalEngine::new(index, retrieval_settings),
            merge: MergePolicy::from_settings(&retrieval_settings),
            agent_settings,
            query_agent,
            answer_agent,
        }
    }

    /// A new summarizing agent; one is built per turn.
    pub fn summarizing_agent(&self) -> ConversationAgent {
        ConversationAgent::new(
            self.llm.clone(),
            self.messages.clone(),
            AgentProfile::summary(&self.agent_settings),
            self.agent_settings.history_window,
        )
    }
}

// Graph State
// TurnState carried through the stages of one user turn

use serde::{Deserialize, Serialize};

use crate::agent::SessionId;
use crate::history::ConversationTurn;
use crate::rag::{MetadataFilter, RetrievalResult};

/// Where a turn is. Stages only move forward; `Failed` is reachable from
/// every non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    #[default]
    Idle,
    ExtractingKeyword,
    Retrieving,
    Answering,
    Summarizing,
    Done,
    Failed,
}

impl TurnStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStage::Idle => "idle",
            TurnStage::ExtractingKeyword => "extracting_keyword",
            TurnStage::Retrieving => "retrieving",
            TurnStage::Answering => "answering",
            TurnStage::Summarizing => "summarizing",
            TurnStage::Done => "done",
            TurnStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnStage::Done | TurnStage::Failed)
    }

    fn successor(&self) -> Option<TurnStage> {
        match self {
            TurnStage::Idle => Some(TurnStage::ExtractingKeyword),
            TurnStage::ExtractingKeyword => Some(TurnStage::Retrieving),
            TurnStage::Retrieving => Some(TurnStage::Answering),
            TurnStage::Answering => Some(TurnStage::Summarizing),
            TurnStage::Summarizing => Some(TurnStage::Done),
            TurnStage::Done | TurnStage::Failed => None,
        }
    }

    pub fn can_advance_to(&self, next: TurnStage) -> bool {
        if next == TurnStage::Failed {
            return !self.is_terminal();
        }
        self.successor() == Some(next)
    }
}

/// Main graph state
#[derive(Debug, Clone)]
pub struct TurnState {
    pub username: String,
    pub query: String,
    pub filter: Option<MetadataFilter>,
    pub stage: TurnStage,

    /// Session of the answering agent; stable across a user's turns.
    pub answer_session: SessionId,

    pub keyword: String,
    /// Merged (possibly truncated) buckets that reach the answer prompt.
    pub retrieval: RetrievalResult,
    /// Serialized form of `retrieval`, persisted with the turn.
    pub search_results: String,
    pub prior_turn: Option<ConversationTurn>,

    pub origin_response: String,
    pub final_response: String,
}

impl TurnState {
    pub fn new(
        username: impl Into<String>,
        query: impl Into<String>,
        filter: Option<MetadataFilter>,
        answer_session: SessionId,
    ) -> Self {
        Self {
            username: username.into(),
            query: query.into(),
            filter,
            stage: TurnStage::Idle,
            answer_session,
            keyword: String::new(),
            retrieval: RetrievalResult::default(),
            search_results: RetrievalResult::default().to_payload(),
            prior_turn: None,
            origin_response: String::new(),
            final_response: String::new(),
        }
    }

    /// Moves to `next`, ignoring out-of-order requests.
    pub fn advance(&mut self, next: TurnStage) -> bool {
        if self.stage.can_advance_to(next) {
            tracing::debug!(from = self.stage.as_str(), to = next.as_str(), "Turn stage");
            self.stage = next;
            true
        } else {
            tracing::warn!(
                from = self.stage.as_str(),
                to = next.as_str(),
                "Ignoring out-of-order stage transition"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_only_move_forward() {
        let mut state = TurnState::new("admin", "q", None, SessionId::new());
        assert!(state.advance(TurnStage::ExtractingKeyword));
        assert!(!state.advance(TurnStage::Answering));
        assert!(state.advance(TurnStage::Retrieving));
        assert!(!state.advance(TurnStage::ExtractingKeyword));
        assert!(state.advance(TurnStage::Failed));
        assert!(!state.advance(TurnStage::Failed));
        assert_eq!(state.stage, TurnStage::Failed);
    }

    #[test]
    fn fresh_state_has_empty_payload() {
        let state = TurnState::new("admin", "q", None, SessionId::new());
        assert_eq!(state.search_results, "[[],[]]");
        assert_eq!(state.stage, TurnStage::Idle);
    }
}

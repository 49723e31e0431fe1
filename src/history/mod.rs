//! Conversation persistence.
//!
//! Two concerns share one sqlite file: completed question/answer turns per
//! username (`chat_history`), and the rolling message log each agent session
//! reads back for history augmentation (`message_store`).

mod sqlite;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

pub use sqlite::HistoryStore;

/// One persisted user turn. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: i64,
    pub username: String,
    pub timestamp: String,
    pub user_query: String,
    pub search_results: String,
    pub origin_agent_response: String,
    pub final_agent_response: String,
}

/// The payload of a completed turn before it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTurn {
    pub username: String,
    pub user_query: String,
    pub search_results: String,
    pub origin_agent_response: String,
    pub final_agent_response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Ai,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::Human => "human",
            MessageRole::Ai => "ai",
            MessageRole::System => "system",
        }
    }

    /// Accepts the chat-completion spellings as well.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "human" | "user" => Some(MessageRole::Human),
            "ai" | "assistant" => Some(MessageRole::Ai),
            "system" => Some(MessageRole::System),
            _ => None,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: i64,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: String,
}

#[async_trait]
pub trait TurnStore: Send + Sync {
    async fn insert_turn(&self, turn: NewTurn) -> Result<i64, ApiError>;

    /// Most recent turn for `username`, ordered by timestamp descending.
    async fn latest_turn(&self, username: &str) -> Result<Option<ConversationTurn>, ApiError>;

    async fn delete_turns(&self, username: &str) -> Result<usize, ApiError>;

    async fn usernames(&self) -> Result<Vec<String>, ApiError>;

    async fn all_turns(&self) -> Result<Vec<ConversationTurn>, ApiError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<i64, ApiError>;

    /// Up to `limit` most recent messages, oldest first. `0` means all.
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<HistoryMessage>, ApiError>;

    async fn clear(&self, session_id: &str) -> Result<usize, ApiError>;
}

//! Prompt-templated conversational agents.
//!
//! There is one agent type; the keyword, answering and summarizing roles are
//! `AgentProfile` values that differ only in prompt and history behaviour.

pub mod markers;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::config::AgentSettings;
use crate::core::errors::ApiError;
use crate::history::{MessageRole, MessageStore};
use crate::llm::{ChatMessage, FragmentReceiver, LlmService};

const INPUT_PLACEHOLDER: &str = "{input}";

/// Key of one agent conversation in the message store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    pub name: &'static str,
    /// Prompt with one `{input}` placeholder.
    pub template: String,
    /// Prepend the session's earlier messages on streaming calls.
    pub remember_history: bool,
}

impl AgentProfile {
    pub fn query(settings: &AgentSettings) -> Self {
        Self {
            name: "query",
            template: settings.query_prompt.clone(),
            remember_history: false,
        }
    }

    pub fn answer(settings: &AgentSettings) -> Self {
        Self {
            name: "answer",
            template: settings.answer_prompt.clone(),
            remember_history: true,
        }
    }

    pub fn summary(settings: &AgentSettings) -> Self {
        Self {
            name: "summary",
            template: settings.summary_prompt.clone(),
            remember_history: false,
        }
    }

    pub fn render(&self, input: &str) -> String {
        if self.template.contains(INPUT_PLACEHOLDER) {
            self.template.replace(INPUT_PLACEHOLDER, input)
        } else {
            format!("{}\n\n{}", self.template, input)
        }
    }
}

#[derive(Clone)]
pub struct ConversationAgent {
    llm: LlmService,
    messages: Arc<dyn MessageStore>,
    profile: AgentProfile,
    history_window: usize,
}

impl ConversationAgent {
    pub fn new(
        llm: LlmService,
        messages: Arc<dyn MessageStore>,
        profile: AgentProfile,
        history_window: usize,
    ) -> Self {
        Self {
            llm,
            messages,
            profile,
            history_window,
        }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// One-shot completion of the rendered prompt. Touches no history.
    pub async fn invoke(&self, input: &str) -> Result<String, ApiError> {
        let prompt = self.profile.render(input);
        self.llm.chat(vec![ChatMessage::user(prompt)]).await
    }

    /// Streams a reply to `input` under `session`. The exchange is written to
    /// the session's history only when the stream is finished successfully.
    pub async fn stream_ask(&self, session: &SessionId, input: &str) -> Result<AgentStream, ApiError> {
        let mut messages = if self.profile.remember_history {
            self.session_messages(session).await
        } else {
            Vec::new()
        };
        messages.push(ChatMessage::user(self.profile.render(input)));

        let fragments = self.llm.stream_chat(messages).await?;
        tracing::debug!(agent = self.profile.name, session = %session, "Streaming reply");

        Ok(AgentStream {
            fragments,
            text: String::new(),
            record: self.profile.remember_history.then(|| PendingExchange {
                messages: self.messages.clone(),
                session: session.clone(),
                input: input.to_string(),
            }),
        })
    }

    pub async fn delete_history(&self, session: &SessionId) -> Result<usize, ApiError> {
        self.messages.clear(session.as_str()).await
    }

    // A history read failure only costs context.
    async fn session_messages(&self, session: &SessionId) -> Vec<ChatMessage> {
        match self.messages.recent(session.as_str(), self.history_window).await {
            Ok(history) => history
                .into_iter()
                .map(|message| match message.role {
                    MessageRole::Human => ChatMessage::user(message.content),
                    MessageRole::Ai => ChatMessage::assistant(message.content),
                    MessageRole::System => ChatMessage::system(message.content),
                })
                .collect(),
            Err(err) => {
                tracing::warn!(session = %session, "Failed to read agent history: {}", err);
                Vec::new()
            }
        }
    }
}

struct PendingExchange {
    messages: Arc<dyn MessageStore>,
    session: SessionId,
    input: String,
}

impl PendingExchange {
    async fn save(&self, reply: &str) -> Result<(), ApiError> {
        let session = self.session.as_str();
        self.messages
            .append(session, MessageRole::Human, &self.input)
            .await?;
        self.messages.append(session, MessageRole::Ai, reply).await?;
        Ok(())
    }
}

/// A finite, non-restartable reply stream. Fragments come from `next`; the
/// full text comes from `finish`, which drains whatever is left.
pub struct AgentStream {
    fragments: FragmentReceiver,
    text: String,
    record: Option<PendingExchange>,
}

impl AgentStream {
    pub async fn next(&mut self) -> Option<Result<String, ApiError>> {
        let item = self.fragments.recv().await?;
        if let Ok(fragment) = &item {
            self.text.push_str(fragment);
        }
        Some(item)
    }

    /// Text received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub async fn finish(mut self) -> Result<String, ApiError> {
        while let Some(item) = self.next().await {
            item?;
        }

        if let Some(pending) = self.record.take() {
            // The reply has already been delivered; a lost history row only
            // costs context on the next turn.
            if let Err(err) = pending.save(&self.text).await {
                tracing::warn!(session = %pending.session, "Failed to record agent exchange: {}", err);
            }
        }
        Ok(self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_follow_settings() {
        let settings = AgentSettings::default();
        assert!(!AgentProfile::query(&settings).remember_history);
        assert!(AgentProfile::answer(&settings).remember_history);
        assert!(!AgentProfile::summary(&settings).remember_history);
    }

    #[test]
    fn render_substitutes_input() {
        let profile = AgentProfile {
            name: "t",
            template: "前缀 {input} 后缀".to_string(),
            remember_history: false,
        };
        assert_eq!(profile.render("试用期"), "前缀 试用期 后缀");

        let bare = AgentProfile {
            template: "无占位符".to_string(),
            ..profile
        };
        assert_eq!(bare.render("x"), "无占位符\n\nx");
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
        assert_eq!(SessionId::from("s1".to_string()).as_str(), "s1");
    }
}

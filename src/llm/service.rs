use std::sync::Arc;

use crate::core::config::LlmSettings;
use crate::core::errors::ApiError;
use crate::llm::provider::{FragmentReceiver, LlmProvider};
use crate::llm::types::{ChatMessage, ChatRequest};

/// Binds a provider to the configured chat and embedding models so callers
/// only deal in messages and text.
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
}

impl LlmService {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await.unwrap_or(false)
    }

    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, ApiError> {
        let request = ChatRequest::new(messages).with_settings(&self.settings);
        self.provider.chat(request, &self.settings.chat_model).await
    }

    pub async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<FragmentReceiver, ApiError> {
        let request = ChatRequest::new(messages).with_settings(&self.settings);
        self.provider
            .stream_chat(request, &self.settings.chat_model)
            .await
    }

    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        self.provider
            .embed(inputs, &self.settings.embedding_model)
            .await
    }
}

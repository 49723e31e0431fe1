#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use lawqa_backend::core::config::defaults::{
    default_config, DEFAULT_ANSWER_PROMPT, DEFAULT_SUMMARY_PROMPT,
};
use lawqa_backend::core::config::{AgentSettings, LlmSettings, RetrievalSettings};
use lawqa_backend::core::errors::ApiError;
use lawqa_backend::graph::build_turn_graph;
use lawqa_backend::history::HistoryStore;
use lawqa_backend::llm::{ChatRequest, FragmentReceiver, LlmProvider, LlmService};
use lawqa_backend::pipeline::{OrchestratorRegistry, PipelineServices, TurnEvent, TurnStream};
use lawqa_backend::rag::chunk::{ARTICLE_NUMBER, LAW_NAME};
use lawqa_backend::rag::{DocumentChunk, EmbeddingIndex, Metadata, SqliteChunkStore, VectorIndex};

const EMBEDDING_DIM: usize = 32;
const FRAGMENT_CHARS: usize = 3;

/// A language model with canned replies.
///
/// Keyword requests are answered from `keywords` by the first needle found
/// in the prompt; answering and summarizing prompts are recognised by their
/// template prefix. Embeddings are character histograms, so texts sharing
/// characters land close together.
#[derive(Default)]
pub struct ScriptedProvider {
    keywords: Vec<(String, String)>,
    answer: String,
    summary: String,
    answer_fails_after: Option<usize>,
    summary_fails_after: Option<usize>,
    pace: Option<Duration>,
    unavailable: AtomicBool,
    requests: Mutex<Vec<ChatRequest>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompt {
    Keyword,
    Answer,
    Summary,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyword(mut self, needle: &str, reply: &str) -> Self {
        self.keywords.push((needle.to_string(), reply.to_string()));
        self
    }

    pub fn answer(mut self, reply: &str) -> Self {
        self.answer = reply.to_string();
        self
    }

    pub fn summary(mut self, reply: &str) -> Self {
        self.summary = reply.to_string();
        self
    }

    /// The answer stream breaks with `ModelUnavailable` after `n` fragments.
    pub fn answer_fails_after(mut self, n: usize) -> Self {
        self.answer_fails_after = Some(n);
        self
    }

    pub fn summary_fails_after(mut self, n: usize) -> Self {
        self.summary_fails_after = Some(n);
        self
    }

    /// Delay before each streamed fragment.
    pub fn pace(mut self, delay: Duration) -> Self {
        self.pace = Some(delay);
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Prompts of every chat call, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<(), ApiError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ApiError::model_unavailable("connection refused"));
        }
        Ok(())
    }

    fn classify(request: &ChatRequest) -> (Prompt, &str) {
        let prompt = request
            .messages
            .last()
            .map(|message| message.content.as_str())
            .unwrap_or_default();

        if prompt.starts_with(template_prefix(DEFAULT_ANSWER_PROMPT)) {
            (Prompt::Answer, prompt)
        } else if prompt.starts_with(template_prefix(DEFAULT_SUMMARY_PROMPT)) {
            (Prompt::Summary, prompt)
        } else {
            (Prompt::Keyword, prompt)
        }
    }

    fn reply_for(&self, request: &ChatRequest) -> String {
        match Self::classify(request) {
            (Prompt::Answer, _) => self.answer.clone(),
            (Prompt::Summary, _) => self.summary.clone(),
            (Prompt::Keyword, prompt) => self
                .keywords
                .iter()
                .find(|(needle, _)| prompt.contains(needle.as_str()))
                .map(|(_, reply)| reply.clone())
                .unwrap_or_default(),
        }
    }

    fn fails_after(&self, request: &ChatRequest) -> Option<usize> {
        match Self::classify(request).0 {
            Prompt::Answer => self.answer_fails_after,
            Prompt::Summary => self.summary_fails_after,
            Prompt::Keyword => None,
        }
    }
}

fn template_prefix(template: &str) -> &str {
    template.split("{input}").next().unwrap_or(template)
}

fn fragments(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(FRAGMENT_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

pub fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; EMBEDDING_DIM];
    for ch in text.chars() {
        vector[(ch as usize) % EMBEDDING_DIM] += 1.0;
    }
    vector
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(!self.unavailable.load(Ordering::SeqCst))
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        self.check_available()?;
        let reply = self.reply_for(&request);
        self.requests.lock().unwrap().push(request);
        Ok(reply)
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
        _model_id: &str,
    ) -> Result<FragmentReceiver, ApiError> {
        self.check_available()?;
        let reply = self.reply_for(&request);
        let fails_after = self.fails_after(&request);
        self.requests.lock().unwrap().push(request);

        let mut parts = fragments(&reply);
        if let Some(n) = fails_after {
            parts.truncate(n);
        }
        let pace = self.pace;
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            for part in parts {
                if let Some(delay) = pace {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(Ok(part)).await.is_err() {
                    return;
                }
            }
            if fails_after.is_some() {
                let _ = tx
                    .send(Err(ApiError::model_unavailable("stream reset")))
                    .await;
            }
        });
        Ok(rx)
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        self.check_available()?;
        Ok(inputs.iter().map(|text| embed_text(text)).collect())
    }
}

/// A pipeline wired to temporary sqlite databases and a scripted model.
pub struct Harness {
    pub dir: TempDir,
    pub provider: Arc<ScriptedProvider>,
    pub history: HistoryStore,
    pub index: Arc<dyn VectorIndex>,
    pub services: Arc<PipelineServices>,
    pub registry: OrchestratorRegistry,
}

impl Harness {
    pub async fn new(provider: ScriptedProvider) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(provider);
        let config = default_config();
        let llm = LlmService::new(provider.clone(), LlmSettings::from_config(&config));

        let history = HistoryStore::new(dir.path().join("history.db")).await.unwrap();
        let chunk_store = SqliteChunkStore::with_path(dir.path().join("law_index.db"))
            .await
            .unwrap();
        let index: Arc<dyn VectorIndex> =
            Arc::new(EmbeddingIndex::new(llm.clone(), Arc::new(chunk_store)));

        let history_handle = Arc::new(history.clone());
        let services = Arc::new(PipelineServices::new(
            llm,
            history_handle.clone(),
            history_handle,
            index.clone(),
            RetrievalSettings::default(),
            AgentSettings::default(),
        ));
        let graph = Arc::new(build_turn_graph().unwrap());
        let registry = OrchestratorRegistry::new(services.clone(), graph);

        Self {
            dir,
            provider,
            history,
            index,
            services,
            registry,
        }
    }
}

pub fn law_chunk(law_name: &str, article_number: &str, content: &str) -> DocumentChunk {
    let mut metadata = Metadata::new();
    metadata.insert(LAW_NAME.to_string(), law_name.to_string());
    metadata.insert(ARTICLE_NUMBER.to_string(), article_number.to_string());
    DocumentChunk::new(content, metadata)
}

/// Events of a turn split by kind, in arrival order.
#[derive(Debug, Default)]
pub struct Collected {
    pub retrieval: Vec<(String, String)>,
    pub answer: String,
    pub summary: String,
    pub summary_started: bool,
    pub order: Vec<&'static str>,
}

pub async fn collect(turn: &mut TurnStream) -> Collected {
    let mut collected = Collected::default();
    while let Some(event) = turn.next().await {
        match event {
            TurnEvent::Retrieval { keyword, payload } => {
                collected.order.push("retrieval");
                collected.retrieval.push((keyword, payload));
            }
            TurnEvent::Answer(fragment) => {
                collected.order.push("answer");
                collected.answer.push_str(&fragment);
            }
            TurnEvent::SummaryStart => {
                collected.order.push("summary_start");
                collected.summary_started = true;
            }
            TurnEvent::Summary(fragment) => {
                collected.order.push("summary");
                collected.summary.push_str(&fragment);
            }
        }
    }
    collected
}

pub fn metadata(pairs: &[(&str, &str)]) -> Metadata {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect::<BTreeMap<_, _>>()
}

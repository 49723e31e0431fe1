//! The vector index seen by the rest of the pipeline: text in, ranked
//! chunks out. Embedding happens here so callers never touch vectors.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::chunk::DocumentChunk;
use super::store::{ChunkStore, MetadataFilter, ScoredChunk};
use crate::core::errors::ApiError;
use crate::llm::LlmService;

const EMBED_BATCH: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub skipped: usize,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert chunks, skipping ids that are already indexed (or repeated
    /// within the same call).
    async fn insert(&self, chunks: Vec<DocumentChunk>) -> Result<IngestReport, ApiError>;

    async fn delete(&self, ids: &[String]) -> Result<usize, ApiError>;

    /// Up to `k` chunks closest to `query_text`, best first.
    async fn search(
        &self,
        query_text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>, ApiError>;

    async fn count(&self) -> Result<usize, ApiError>;
}

pub struct EmbeddingIndex {
    llm: LlmService,
    store: Arc<dyn ChunkStore>,
}

impl EmbeddingIndex {
    pub fn new(llm: LlmService, store: Arc<dyn ChunkStore>) -> Self {
        Self { llm, store }
    }
}

#[async_trait]
impl VectorIndex for EmbeddingIndex {
    async fn insert(&self, chunks: Vec<DocumentChunk>) -> Result<IngestReport, ApiError> {
        let total = chunks.len();
        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let mut seen: HashSet<String> = self.store.existing_ids(&ids).await?.into_iter().collect();

        let fresh: Vec<DocumentChunk> = chunks
            .into_iter()
            .filter(|chunk| seen.insert(chunk.id.clone()))
            .collect();

        let mut inserted = 0;
        for batch in fresh.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.llm.embed(&texts).await?;
            let items = batch.iter().cloned().zip(embeddings).collect();
            inserted += self.store.insert_batch(items).await?;
        }

        let report = IngestReport {
            inserted,
            skipped: total - inserted,
        };
        tracing::info!(
            inserted = report.inserted,
            skipped = report.skipped,
            "Indexed law chunks"
        );
        Ok(report)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, ApiError> {
        self.store.delete(ids).await
    }

    async fn search(
        &self,
        query_text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>, ApiError> {
        let embeddings = self.llm.embed(&[query_text.to_string()]).await?;
        let Some(query_embedding) = embeddings.into_iter().next() else {
            return Ok(Vec::new());
        };
        self.store.search(&query_embedding, k, filter).await
    }

    async fn count(&self) -> Result<usize, ApiError> {
        self.store.count().await
    }
}

//! ChunkStore trait: persistence of embedded law chunks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::chunk::{DocumentChunk, Metadata};
use crate::core::errors::ApiError;

/// Metadata equality predicates; every pair must match.
pub type MetadataFilter = Metadata;

/// A chunk with its similarity to the query (higher = closer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

pub fn matches_filter(chunk: &DocumentChunk, filter: Option<&MetadataFilter>) -> bool {
    filter.map_or(true, |filter| {
        filter
            .iter()
            .all(|(key, value)| chunk.metadata.get(key) == Some(value))
    })
}

#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert chunks with their embeddings. Ids already present are left
    /// untouched; returns how many rows were actually written.
    async fn insert_batch(&self, items: Vec<(DocumentChunk, Vec<f32>)>) -> Result<usize, ApiError>;

    /// Which of `ids` are already stored.
    async fn existing_ids(&self, ids: &[String]) -> Result<Vec<String>, ApiError>;

    /// Chunks ordered by descending cosine similarity, at most `limit`.
    /// Equal scores keep insertion order.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>, ApiError>;

    async fn get(&self, id: &str) -> Result<Option<DocumentChunk>, ApiError>;

    async fn delete(&self, ids: &[String]) -> Result<usize, ApiError>;

    async fn count(&self) -> Result<usize, ApiError>;
}

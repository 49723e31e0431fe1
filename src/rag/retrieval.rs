//! Keyword retrieval: a wide vector lookup for recall, then exact substring
//! checks for precision.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::chunk::DocumentChunk;
use super::index::VectorIndex;
use super::store::{MetadataFilter, ScoredChunk};
use crate::core::config::RetrievalSettings;
use crate::core::errors::ApiError;

/// The two buckets of one keyword search, each in index ranking order.
/// `to_payload` writes it as the array `[title_matches, body_matches]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Keyword found in both `law_name` and content.
    pub title_matches: Vec<DocumentChunk>,
    /// Keyword found in content only.
    pub body_matches: Vec<DocumentChunk>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.title_matches.is_empty() && self.body_matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.title_matches.len() + self.body_matches.len()
    }

    /// Title matches first, then body matches.
    pub fn chunks(&self) -> impl Iterator<Item = &DocumentChunk> {
        self.title_matches.iter().chain(self.body_matches.iter())
    }

    /// The persisted form of the bucket pair; empty buckets give `[[],[]]`.
    pub fn to_payload(&self) -> String {
        serde_json::to_string(&(&self.title_matches, &self.body_matches))
            .unwrap_or_else(|_| "[[],[]]".to_string())
    }
}

/// Splits ranked candidates into buckets by where `keyword` occurs. Each
/// candidate lands in at most one bucket; order is preserved.
pub fn partition(keyword: &str, candidates: Vec<ScoredChunk>) -> RetrievalResult {
    let mut result = RetrievalResult::default();
    if keyword.is_empty() {
        return result;
    }

    for ScoredChunk { chunk, .. } in candidates {
        if !chunk.content.contains(keyword) {
            continue;
        }
        if chunk.law_name().contains(keyword) {
            result.title_matches.push(chunk);
        } else {
            result.body_matches.push(chunk);
        }
    }
    result
}

#[derive(Clone)]
pub struct RetrievalEngine {
    index: Arc<dyn VectorIndex>,
    settings: RetrievalSettings,
}

impl RetrievalEngine {
    pub fn new(index: Arc<dyn VectorIndex>, settings: RetrievalSettings) -> Self {
        Self { index, settings }
    }

    pub fn settings(&self) -> RetrievalSettings {
        self.settings
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// An empty keyword or an empty index gives empty buckets, not an error.
    pub async fn search(
        &self,
        keyword: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<RetrievalResult, ApiError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            tracing::debug!("Empty keyword, skipping vector lookup");
            return Ok(RetrievalResult::default());
        }

        let candidates = self
            .index
            .search(keyword, self.settings.candidate_k, filter)
            .await?;
        let candidate_count = candidates.len();
        let result = partition(keyword, candidates);

        tracing::info!(
            keyword,
            candidates = candidate_count,
            title_matches = result.title_matches.len(),
            body_matches = result.body_matches.len(),
            "Retrieval finished"
        );
        Ok(result)
    }
}

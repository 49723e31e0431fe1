//! Bounds how much retrieved text reaches the answering model.

use super::chunk::DocumentChunk;
use super::retrieval::RetrievalResult;
use crate::core::config::RetrievalSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    /// A bucket larger than this is truncated.
    pub threshold: usize,
    /// Number of top-ranked chunks a truncated bucket keeps.
    pub prefix: usize,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self::from_settings(&RetrievalSettings::default())
    }
}

impl MergePolicy {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            threshold: settings.bucket_threshold,
            prefix: settings.bucket_prefix.max(1),
        }
    }

    /// Truncates each oversized bucket to its top `prefix` chunks and leaves
    /// small buckets whole. A non-empty bucket never comes out empty.
    pub fn apply(&self, result: &RetrievalResult) -> RetrievalResult {
        let trim = |bucket: &[DocumentChunk]| {
            if bucket.len() > self.threshold {
                bucket[..self.prefix.min(bucket.len())].to_vec()
            } else {
                bucket.to_vec()
            }
        };

        RetrievalResult {
            title_matches: trim(&result.title_matches),
            body_matches: trim(&result.body_matches),
        }
    }
}

/// Renders merged chunks as the context block for the answering prompt.
pub fn render_context(result: &RetrievalResult) -> String {
    result
        .chunks()
        .map(|chunk| {
            let mut header = chunk.law_name().to_string();
            if let Some(article) = chunk.article_number().filter(|a| !a.is_empty()) {
                header.push(' ');
                header.push_str(article);
            }
            if header.is_empty() {
                chunk.content.clone()
            } else {
                format!("【{}】{}", header, chunk.content)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

//! Law-text chunks and their content-derived identity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const LAW_NAME: &str = "law_name";
pub const CHAPTER: &str = "chapter";
pub const SECTION: &str = "section";
pub const ARTICLE_NUMBER: &str = "article_number";
pub const CATEGORY: &str = "category";
pub const URL: &str = "url";
pub const ID: &str = "id";

const ID_PREFIX_CHARS: usize = 64;

pub type Metadata = BTreeMap<String, String>;

/// One retrievable unit of statute text (an article, or a whole document
/// when the cleaner could not segment it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    #[serde(rename = "page_content")]
    pub content: String,
    pub metadata: Metadata,
}

impl DocumentChunk {
    /// Derives the id from the metadata and content and records it under
    /// `metadata.id`. Any incoming `id` is overwritten.
    pub fn new(content: impl Into<String>, mut metadata: Metadata) -> Self {
        let content = content.into();
        let id = chunk_id(
            metadata.get(LAW_NAME).map(String::as_str).unwrap_or_default(),
            metadata
                .get(ARTICLE_NUMBER)
                .map(String::as_str)
                .unwrap_or_default(),
            &content,
        );
        metadata.insert(ID.to_string(), id.clone());
        Self {
            id,
            content,
            metadata,
        }
    }

    pub fn law_name(&self) -> &str {
        self.metadata
            .get(LAW_NAME)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn article_number(&self) -> Option<&str> {
        self.metadata.get(ARTICLE_NUMBER).map(String::as_str)
    }
}

/// Hex SHA-256 over law name, article number and the first 64 characters of
/// the content, unit-separator delimited.
pub fn chunk_id(law_name: &str, article_number: &str, content: &str) -> String {
    let prefix: String = content.chars().take(ID_PREFIX_CHARS).collect();
    let mut hasher = Sha256::new();
    hasher.update(law_name.as_bytes());
    hasher.update([0x1f]);
    hasher.update(article_number.as_bytes());
    hasher.update([0x1f]);
    hasher.update(prefix.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(law: &str, article: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert(LAW_NAME.to_string(), law.to_string());
        m.insert(ARTICLE_NUMBER.to_string(), article.to_string());
        m
    }

    #[test]
    fn id_is_stable_for_identical_input() {
        let a = DocumentChunk::new("第一条 为了保护民事主体的合法权益", meta("民法典", "第一条"));
        let b = DocumentChunk::new("第一条 为了保护民事主体的合法权益", meta("民法典", "第一条"));
        assert_eq!(a.id, b.id);
        assert_eq!(a.metadata.get(ID), Some(&a.id));
        assert_eq!(a.id.len(), 64);
    }

    #[test]
    fn id_only_looks_at_the_content_prefix() {
        let head: String = "法".repeat(64);
        let a = chunk_id("刑法", "第二条", &format!("{head}甲"));
        let b = chunk_id("刑法", "第二条", &format!("{head}乙"));
        assert_eq!(a, b);
        assert_ne!(a, chunk_id("刑法", "第三条", &head));
    }

    #[test]
    fn fields_do_not_bleed_into_each_other() {
        assert_ne!(chunk_id("ab", "c", "x"), chunk_id("a", "bc", "x"));
    }
}

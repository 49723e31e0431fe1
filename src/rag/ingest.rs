//! Loads the cleaner's output: JSON arrays of `{ page_content, metadata }`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chunk::{DocumentChunk, Metadata};
use crate::core::errors::ApiError;

/// One record as written by the cleaning stage.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDocument {
    #[serde(alias = "content")]
    pub page_content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl RawDocument {
    pub fn into_chunk(self) -> DocumentChunk {
        DocumentChunk::new(self.page_content, flatten_metadata(self.metadata))
    }
}

#[derive(Debug, Default, Serialize)]
pub struct LoadSummary {
    #[serde(skip)]
    pub chunks: Vec<DocumentChunk>,
    pub processed_files: usize,
    pub failed_files: usize,
    pub documents: usize,
}

/// Metadata values become strings; nulls are dropped.
fn flatten_metadata(raw: serde_json::Map<String, Value>) -> Metadata {
    raw.into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, text))
        })
        .collect()
}

pub fn parse_documents(json: &str) -> Result<Vec<DocumentChunk>, ApiError> {
    let raw: Vec<RawDocument> = serde_json::from_str(json)
        .map_err(|e| ApiError::BadRequest(format!("Invalid document JSON: {}", e)))?;
    Ok(raw
        .into_iter()
        .filter(|doc| !doc.page_content.trim().is_empty())
        .map(RawDocument::into_chunk)
        .collect())
}

pub fn load_json_file(path: &Path) -> Result<Vec<DocumentChunk>, ApiError> {
    let text = fs::read_to_string(path)
        .map_err(|e| ApiError::NotFound(format!("{}: {}", path.display(), e)))?;
    parse_documents(&text)
}

/// Loads every `*.json` file directly under `dir`. A bad file is counted and
/// logged, never fatal.
pub fn load_json_dir(dir: &Path) -> Result<LoadSummary, ApiError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ApiError::NotFound(format!("{}: {}", dir.display(), e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();

    tracing::info!(dir = %dir.display(), files = files.len(), "Loading law documents");

    let mut summary = LoadSummary::default();
    for file in files {
        match load_json_file(&file) {
            Ok(chunks) => {
                tracing::info!(file = %file.display(), documents = chunks.len(), "Loaded file");
                summary.documents += chunks.len();
                summary.chunks.extend(chunks);
                summary.processed_files += 1;
            }
            Err(err) => {
                tracing::warn!(file = %file.display(), "Skipping unreadable file: {}", err);
                summary.failed_files += 1;
            }
        }
    }
    Ok(summary)
}

/// A file loads alone; a directory loads all its JSON files.
pub fn load_path(path: &Path) -> Result<LoadSummary, ApiError> {
    if path.is_dir() {
        return load_json_dir(path);
    }
    let chunks = load_json_file(path)?;
    Ok(LoadSummary {
        documents: chunks.len(),
        chunks,
        processed_files: 1,
        failed_files: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::chunk::{ID, LAW_NAME};

    const SAMPLE: &str = r#"[
        {"page_content": "第十九条 劳动合同期限三个月以上不满一年的，试用期不得超过一个月",
         "metadata": {"law_name": "劳动合同法", "article_number": "第十九条", "chapter": "第二章", "page": 3, "note": null}},
        {"page_content": "   ", "metadata": {"law_name": "空"}}
    ]"#;

    #[test]
    fn parses_cleaner_output() {
        let chunks = parse_documents(SAMPLE).unwrap();
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.metadata.get(LAW_NAME).map(String::as_str), Some("劳动合同法"));
        assert_eq!(chunk.metadata.get("page").map(String::as_str), Some("3"));
        assert!(!chunk.metadata.contains_key("note"));
        assert_eq!(chunk.metadata.get(ID), Some(&chunk.id));
    }

    #[test]
    fn directory_load_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), SAMPLE).unwrap();
        fs::write(dir.path().join("b.json"), "{not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let summary = load_path(dir.path()).unwrap();
        assert_eq!(summary.processed_files, 1);
        assert_eq!(summary.failed_files, 1);
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.chunks.len(), 1);
    }

    #[test]
    fn missing_path_is_not_found() {
        let err = load_path(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}

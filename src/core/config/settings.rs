//! Typed views over the merged configuration `Value`.
//!
//! Every accessor falls back to the built-in default when a key is missing,
//! so callers never have to care whether `config.yml` mentions a section.

use std::time::Duration;

use serde_json::Value;

use super::defaults::{DEFAULT_ANSWER_PROMPT, DEFAULT_QUERY_PROMPT, DEFAULT_SUMMARY_PROMPT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    OpenAi,
}

impl ProviderKind {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "openai" | "lmstudio" => ProviderKind::OpenAi,
            _ => ProviderKind::Ollama,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub num_ctx: u64,
    pub temperature: Option<f64>,
    /// Bounds connection setup only; generation itself is never cut off.
    pub connect_timeout: Duration,
}

impl LlmSettings {
    pub fn from_config(config: &Value) -> Self {
        let section = config.get("llm");
        let text = |key: &str, fallback: &str| {
            section
                .and_then(|v| v.get(key))
                .and_then(|v| v.as_str())
                .unwrap_or(fallback)
                .to_string()
        };

        Self {
            provider: ProviderKind::from_str(&text("provider", "ollama")),
            base_url: text("base_url", "http://localhost:11434"),
            chat_model: text("chat_model", "qwen3:8b"),
            embedding_model: text("embedding_model", "bge-m3"),
            num_ctx: section
                .and_then(|v| v.get("num_ctx"))
                .and_then(|v| v.as_u64())
                .unwrap_or(8192),
            temperature: section
                .and_then(|v| v.get("temperature"))
                .and_then(|v| v.as_f64()),
            connect_timeout: Duration::from_secs(
                section
                    .and_then(|v| v.get("connect_timeout_secs"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(10),
            ),
        }
    }
}

/// Knobs for the vector lookup and the bucket merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalSettings {
    /// k passed to the index; deliberately far above any section size.
    pub candidate_k: usize,
    /// A bucket holding more than this many chunks gets truncated.
    pub bucket_threshold: usize,
    /// How many top-ranked chunks a truncated bucket keeps.
    pub bucket_prefix: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            candidate_k: 128_718,
            bucket_threshold: 3,
            bucket_prefix: 2,
        }
    }
}

impl RetrievalSettings {
    pub fn from_config(config: &Value) -> Self {
        let defaults = Self::default();
        let section = config.get("retrieval");
        let read = |key: &str, fallback: usize| {
            section
                .and_then(|v| v.get(key))
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(fallback)
        };

        Self {
            candidate_k: read("candidate_k", defaults.candidate_k).max(1),
            bucket_threshold: read("bucket_threshold", defaults.bucket_threshold),
            bucket_prefix: read("bucket_prefix", defaults.bucket_prefix).max(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub history_window: usize,
    pub reasoning_delimiter: String,
    pub query_prompt: String,
    pub answer_prompt: String,
    pub summary_prompt: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            history_window: 10,
            reasoning_delimiter: "</think>".to_string(),
            query_prompt: DEFAULT_QUERY_PROMPT.to_string(),
            answer_prompt: DEFAULT_ANSWER_PROMPT.to_string(),
            summary_prompt: DEFAULT_SUMMARY_PROMPT.to_string(),
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &Value) -> Self {
        let defaults = Self::default();
        let section = config.get("agents");
        let text = |key: &str, fallback: String| {
            section
                .and_then(|v| v.get(key))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or(fallback)
        };

        Self {
            history_window: section
                .and_then(|v| v.get("history_window"))
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(defaults.history_window),
            reasoning_delimiter: text("reasoning_delimiter", defaults.reasoning_delimiter),
            query_prompt: text("query_prompt", defaults.query_prompt),
            answer_prompt: text("answer_prompt", defaults.answer_prompt),
            summary_prompt: text("summary_prompt", defaults.summary_prompt),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl ServerSettings {
    pub fn from_config(config: &Value) -> Self {
        let section = config.get("server");
        Self {
            host: section
                .and_then(|v| v.get("host"))
                .and_then(|v| v.as_str())
                .unwrap_or("127.0.0.1")
                .to_string(),
            port: section
                .and_then(|v| v.get("port"))
                .and_then(|v| v.as_u64())
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(8000),
            cors_allowed_origins: section
                .and_then(|v| v.get("cors_allowed_origins"))
                .and_then(|v| v.as_array())
                .map(|list| {
                    list.iter()
                        .filter_map(|item| item.as_str())
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .map(|item| item.to_string())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub history_db: String,
    pub index_db: String,
}

impl StorageSettings {
    pub fn from_config(config: &Value) -> Self {
        let section = config.get("storage");
        let text = |key: &str, fallback: &str| {
            section
                .and_then(|v| v.get(key))
                .and_then(|v| v.as_str())
                .unwrap_or(fallback)
                .to_string()
        };
        Self {
            history_db: text("history_db", "history.db"),
            index_db: text("index_db", "law_index.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::defaults::default_config;
    use serde_json::json;

    #[test]
    fn defaults_round_trip_through_value() {
        let config = default_config();
        assert_eq!(RetrievalSettings::from_config(&config), RetrievalSettings::default());

        let agents = AgentSettings::from_config(&config);
        assert_eq!(agents.reasoning_delimiter, "</think>");
        assert!(agents.query_prompt.contains("{input}"));

        let llm = LlmSettings::from_config(&config);
        assert_eq!(llm.provider, ProviderKind::Ollama);
        assert_eq!(llm.num_ctx, 8192);
        assert_eq!(llm.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn missing_sections_fall_back() {
        let config = json!({});
        let retrieval = RetrievalSettings::from_config(&config);
        assert_eq!(retrieval.bucket_threshold, 3);
        assert_eq!(ServerSettings::from_config(&config).port, 8000);
    }

    #[test]
    fn provider_aliases() {
        assert_eq!(ProviderKind::from_str("LMStudio"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::from_str("anything"), ProviderKind::Ollama);
    }
}

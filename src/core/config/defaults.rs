use serde_json::{json, Value};

pub const DEFAULT_QUERY_PROMPT: &str = "你是一个生成查询的智能体，你只需要输出查询的一个关键词即可，如用户输入“鹦鹉法规”，你输出：鹦鹉，用户输入:{input}";

pub const DEFAULT_ANSWER_PROMPT: &str = "你是一个法律问答助手，请使用中文回答。\n输入包含上一轮对话、检索到的法律条文和用户问题。回答时以用户的原始问题为主，检索内容为辅；如果检索内容为空或与问题无关，请忽略检索内容，直接根据你的知识回答。\n\n{input}";

pub const DEFAULT_SUMMARY_PROMPT: &str = "你是一个总结智能体，你需要总结传递给你的内容，给出简洁的最终回答，不要逐字重复传递给你的内容。\n\n{input}";

/// Baseline configuration. `config.yml` is deep-merged over this.
pub fn default_config() -> Value {
    json!({
        "server": {
            "host": "127.0.0.1",
            "port": 8000,
            "cors_allowed_origins": []
        },
        "llm": {
            "provider": "ollama",
            "base_url": "http://localhost:11434",
            "chat_model": "qwen3:8b",
            "embedding_model": "bge-m3",
            "num_ctx": 8192,
            "connect_timeout_secs": 10
        },
        "retrieval": {
            "candidate_k": 128718,
            "bucket_threshold": 3,
            "bucket_prefix": 2
        },
        "agents": {
            "history_window": 10,
            "reasoning_delimiter": "</think>",
            "query_prompt": DEFAULT_QUERY_PROMPT,
            "answer_prompt": DEFAULT_ANSWER_PROMPT,
            "summary_prompt": DEFAULT_SUMMARY_PROMPT
        },
        "storage": {
            "history_db": "history.db",
            "index_db": "law_index.db"
        }
    })
}

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::{FragmentReceiver, LineBuffer, LlmProvider};
use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Native Ollama API. Streaming replies are newline-delimited JSON objects,
/// the last one carrying `"done": true`.
#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn request_body(request: &ChatRequest, model_id: &str, stream: bool) -> Value {
        let mut options = serde_json::Map::new();
        if let Some(ctx) = request.num_ctx {
            options.insert("num_ctx".to_string(), json!(ctx));
        }
        if let Some(t) = request.temperature {
            options.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.top_p {
            options.insert("top_p".to_string(), json!(t));
        }
        if let Some(t) = request.max_tokens {
            options.insert("num_predict".to_string(), json!(t));
        }
        if let Some(s) = &request.stop {
            options.insert("stop".to_string(), json!(s));
        }

        json!({
            "model": model_id,
            "messages": request.messages,
            "stream": stream,
            "options": Value::Object(options),
        })
    }
}

/// One NDJSON line from `/api/chat`.
#[derive(Debug, PartialEq)]
enum ChatLine {
    Content(String),
    Done(Option<String>),
    Error(String),
    Skip,
}

fn parse_chat_line(line: &str) -> ChatLine {
    let Ok(json) = serde_json::from_str::<Value>(line) else {
        return ChatLine::Skip;
    };
    if let Some(err) = json["error"].as_str() {
        return ChatLine::Error(err.to_string());
    }
    let content = json["message"]["content"]
        .as_str()
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string());
    if json["done"].as_bool().unwrap_or(false) {
        return ChatLine::Done(content);
    }
    match content {
        Some(content) => ChatLine::Content(content),
        None => ChatLine::Skip,
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::request_body(&request, model_id, false);

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::ModelUnavailable(format!(
                "ollama chat failed ({status}): {text}"
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::from_transport)?;
        if let Some(err) = payload["error"].as_str() {
            return Err(ApiError::ModelUnavailable(err.to_string()));
        }
        Ok(payload["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
        model_id: &str,
    ) -> Result<FragmentReceiver, ApiError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::request_body(&request, model_id, true);

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::ModelUnavailable(format!(
                "ollama stream failed ({status}): {text}"
            )));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            let mut lines = LineBuffer::default();
            let mut pending = Vec::new();
            loop {
                let next = stream.next().await;
                let ended = next.is_none();
                match next {
                    Some(Ok(bytes)) => pending.extend(lines.push(&bytes)),
                    Some(Err(e)) => {
                        let _ = tx.send(Err(ApiError::from_transport(e))).await;
                        return;
                    }
                    None => pending.extend(lines.finish()),
                }

                for line in pending.drain(..) {
                    match parse_chat_line(&line) {
                        ChatLine::Content(content) => {
                            if tx.send(Ok(content)).await.is_err() {
                                return;
                            }
                        }
                        ChatLine::Done(tail) => {
                            if let Some(content) = tail {
                                let _ = tx.send(Ok(content)).await;
                            }
                            return;
                        }
                        ChatLine::Error(message) => {
                            let _ = tx.send(Err(ApiError::ModelUnavailable(message))).await;
                            return;
                        }
                        ChatLine::Skip => {}
                    }
                }

                if ended {
                    return;
                }
            }
        });

        Ok(rx)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::ModelUnavailable(format!(
                "ollama embed failed ({status}): {text}"
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::from_transport)?;
        let embeddings: Vec<Vec<f32>> = payload["embeddings"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.as_array())
                    .map(|vals| {
                        vals.iter()
                            .filter_map(|v| v.as_f64().map(|f| f as f32))
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default();

        if embeddings.len() != inputs.len() {
            return Err(ApiError::Internal(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }
}

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::{FragmentReceiver, LineBuffer, LlmProvider};
use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Any server speaking the `/v1/chat/completions` dialect (LM Studio, vLLM,
/// llama.cpp server, OpenAI itself).
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    base_url: String,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn request_body(request: &ChatRequest, model_id: &str, stream: bool) -> Value {
        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
            "stream": stream,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.top_p {
                obj.insert("top_p".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
            if let Some(s) = &request.stop {
                obj.insert("stop".to_string(), json!(s));
            }
        }
        body
    }
}

/// One SSE line from a streaming completion.
enum SseLine {
    Content(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<Value>(data) {
        Ok(json) => match json["choices"][0]["delta"]["content"].as_str() {
            Some(content) if !content.is_empty() => SseLine::Content(content.to_string()),
            _ => SseLine::Skip,
        },
        Err(_) => SseLine::Skip,
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/v1/models", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
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
                "chat completion failed ({status}): {text}"
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::from_transport)?;
        Ok(payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
        model_id: &str,
    ) -> Result<FragmentReceiver, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
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
                "chat stream failed ({status}): {text}"
            )));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            let mut lines = LineBuffer::default();
            while let Some(item) = stream.next().await {
                let bytes = match item {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(Err(ApiError::from_transport(e))).await;
                        return;
                    }
                };
                for line in lines.push(&bytes) {
                    match parse_sse_line(&line) {
                        SseLine::Content(content) => {
                            if tx.send(Ok(content)).await.is_err() {
                                return;
                            }
                        }
                        SseLine::Done => return,
                        SseLine::Skip => {}
                    }
                }
            }
            if let Some(line) = lines.finish() {
                if let SseLine::Content(content) = parse_sse_line(&line) {
                    let _ = tx.send(Ok(content)).await;
                }
            }
        });

        Ok(rx)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/v1/embeddings", self.base_url);
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
                "embedding request failed ({status}): {text}"
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::from_transport)?;
        let embeddings: Vec<Vec<f32>> = payload["data"]
            .as_array()
            .map(|data| {
                data.iter()
                    .filter_map(|item| item["embedding"].as_array())
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

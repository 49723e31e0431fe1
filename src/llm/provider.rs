use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Fragments of one streamed completion, in generation order. The channel
/// closes when generation finishes; an `Err` item ends the stream early.
pub type FragmentReceiver = mpsc::Receiver<Result<String, ApiError>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "ollama", "openai")
    fn name(&self) -> &str;

    /// check if the provider is reachable
    async fn health_check(&self) -> Result<bool, ApiError>;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError>;

    /// chat completion (streaming)
    async fn stream_chat(
        &self,
        request: ChatRequest,
        model_id: &str,
    ) -> Result<FragmentReceiver, ApiError>;

    /// generate embeddings
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError>;
}

/// Splits a byte stream into complete lines. HTTP chunks respect neither
/// line nor character boundaries, so raw bytes are held back until their
/// newline arrives and only whole lines are decoded.
#[derive(Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(line) = decode_line(line) {
                lines.push(line);
            }
        }
        lines
    }

    pub(crate) fn finish(&mut self) -> Option<String> {
        decode_line(std::mem::take(&mut self.pending))
    }
}

fn decode_line(bytes: Vec<u8>) -> Option<String> {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    };
    let line = text.trim();
    (!line.is_empty()).then(|| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_joins_split_lines() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"{\"a\":").is_empty());
        assert_eq!(buffer.push(b"1}\n{\"b\""), vec!["{\"a\":1}".to_string()]);
        assert_eq!(buffer.push(b":2}\n\n"), vec!["{\"b\":2}".to_string()]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn line_buffer_keeps_characters_split_across_chunks() {
        let line = "{\"message\":{\"content\":\"试用期\"},\"done\":false}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xe8).unwrap() + 1;

        let mut buffer = LineBuffer::default();
        assert!(buffer.push(&line[..split]).is_empty());
        assert_eq!(
            buffer.push(&line[split..]),
            vec!["{\"message\":{\"content\":\"试用期\"},\"done\":false}".to_string()]
        );
    }

    #[test]
    fn line_buffer_flushes_unterminated_tail() {
        let mut buffer = LineBuffer::default();
        buffer.push(b"data: [DONE]");
        assert_eq!(buffer.finish().as_deref(), Some("data: [DONE]"));
    }
}

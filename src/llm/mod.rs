pub mod ollama;
pub mod openai;
pub mod provider;
pub mod service;
pub mod types;

use std::sync::Arc;

use reqwest::Client;

use crate::core::config::{LlmSettings, ProviderKind};
use crate::core::errors::ApiError;

pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatibleProvider;
pub use provider::{FragmentReceiver, LlmProvider};
pub use service::LlmService;
pub use types::{ChatMessage, ChatRequest};

pub fn build_provider(settings: &LlmSettings) -> Result<Arc<dyn LlmProvider>, ApiError> {
    let client = Client::builder()
        .connect_timeout(settings.connect_timeout)
        .build()
        .map_err(ApiError::internal)?;

    let provider: Arc<dyn LlmProvider> = match settings.provider {
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(settings.base_url.clone(), client)),
        ProviderKind::OpenAi => Arc::new(OpenAiCompatibleProvider::new(
            settings.base_url.clone(),
            client,
        )),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::core::config::defaults::default_config;

    async fn write_chunk(socket: &mut tokio::net::TcpStream, data: &str) {
        let frame = format!("{:x}\r\n{}\r\n", data.len(), data);
        socket.write_all(frame.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn slow_generation_is_not_cut_off() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 8192];
            let _ = socket.read(&mut request).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n",
                )
                .await
                .unwrap();
            write_chunk(&mut socket, "{\"message\":{\"content\":\"试用\"},\"done\":false}\n").await;
            tokio::time::sleep(Duration::from_millis(1500)).await;
            write_chunk(&mut socket, "{\"message\":{\"content\":\"期\"},\"done\":true}\n").await;
            socket.write_all(b"0\r\n\r\n").await.unwrap();
        });

        let mut config = default_config();
        config["llm"]["base_url"] = json!(format!("http://{addr}"));
        config["llm"]["connect_timeout_secs"] = json!(1);
        let settings = LlmSettings::from_config(&config);
        let llm = LlmService::new(build_provider(&settings).unwrap(), settings);

        let mut fragments = llm
            .stream_chat(vec![ChatMessage::user("试用期")])
            .await
            .unwrap();
        let mut text = String::new();
        while let Some(item) = fragments.recv().await {
            text.push_str(&item.unwrap());
        }
        assert_eq!(text, "试用期");
    }
}

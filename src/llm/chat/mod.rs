pub mod ollama;
pub mod openai;
pub mod hosted;

use async_trait::async_trait;
use futures::{ Stream, Future };
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmError, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use self::hosted::HostedChatClient;
use crate::models::chat::ChatMessage;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Lazy, finite, one-shot sequence of text fragments from a model.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<CompletionResponse, LlmError>;

    /// Streams the reply token by token. Backends without native streaming
    /// deliver their whole answer as a single fragment.
    async fn stream_completion(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        let response = self.complete(messages).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(response.response) })))
    }

    fn get_model(&self) -> String;

    fn supports_native_streaming(&self) -> bool {
        false
    }
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> TokenStream
    where
        F: FnOnce(mpsc::Sender<Result<String, LlmError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Anthropic | LlmType::Gemini | LlmType::DeepSeek | LlmType::Groq | LlmType::XAI => {
            let specific_client = HostedChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// Turns a non-2xx reply into [`LlmError::Api`] carrying the response body.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(LlmError::Api { status: status.as_u16(), message })
}

/// Removes every complete line from `pending`, leaving a trailing partial line
/// in place for the next network chunk. Bytes are only decoded once their line
/// is complete, so a character split across chunks survives intact.
pub(crate) fn drain_lines(pending: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = pending.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_lines_keeps_partial_tail() {
        let mut pending = b"{\"a\":1}\n{\"b\":".to_vec();
        assert_eq!(drain_lines(&mut pending), vec!["{\"a\":1}".to_string()]);
        assert_eq!(pending, b"{\"b\":");

        pending.extend_from_slice(b"2}\n\n");
        assert_eq!(drain_lines(&mut pending), vec!["{\"b\":2}".to_string()]);
        assert!(pending.is_empty());
    }

    #[test]
    fn drain_lines_joins_character_split_across_chunks() {
        let line = "{\"message\":{\"content\":\"café\"},\"done\":true}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xc3).unwrap() + 1;

        let mut pending = line[..split].to_vec();
        assert!(drain_lines(&mut pending).is_empty());
        pending.extend_from_slice(&line[split..]);
        let lines = drain_lines(&mut pending);
        assert_eq!(lines, vec![r#"{"message":{"content":"café"},"done":true}"#.to_string()]);
        assert!(!lines[0].contains('\u{fffd}'));
    }

    #[test]
    fn new_client_rejects_openai_without_key() {
        let config = LlmConfig {
            llm_type: LlmType::OpenAI,
            ..LlmConfig::default()
        };
        assert!(matches!(new_client(&config), Err(LlmError::Config(_))));
    }

    #[test]
    fn new_client_builds_default_ollama() {
        let client = new_client(&LlmConfig::default()).unwrap();
        assert!(client.supports_native_streaming());
        assert_eq!(client.get_model(), "llama3.2:3b");
    }
}

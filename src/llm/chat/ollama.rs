use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use super::{ check_status, create_streaming_response, drain_lines, ChatClient, CompletionResponse, TokenStream };
use crate::llm::{ LlmConfig, LlmError, LlmType };
use crate::models::chat::ChatMessage;
use futures::StreamExt;
use log::{ debug, info };

const DEFAULT_MODEL: &str = "llama3.2:3b";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ReplyMessage>,
    #[serde(default)]
    done: bool,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>, temperature: f32) -> Self {
        let model = completion_model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());

        Self {
            http: HttpClient::new(),
            base_url: url.trim_end_matches('/').to_string(),
            completion_model: model,
            temperature,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.llm_type != LlmType::Ollama {
            return Err(LlmError::Config("Invalid config type for OllamaClient".into()));
        }

        Ok(Self::new(config.base_url.clone(), config.completion_model.clone(), config.temperature))
    }

    fn request<'a>(&'a self, messages: &'a [ChatMessage], stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.completion_model,
            messages: messages
                .iter()
                .map(|m| OllamaMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            stream,
            options: ChatOptions { temperature: self.temperature },
        }
    }
}

/// Parses one NDJSON line of a streaming `/api/chat` reply into
/// `(fragment, done)`.
fn parse_stream_line(line: &str) -> Option<(String, bool)> {
    match serde_json::from_str::<ChatResponse>(line) {
        Ok(resp) => Some((resp.message.map(|m| m.content).unwrap_or_default(), resp.done)),
        Err(e) => {
            info!("JSON parse error: {} for line: {}", e, line);
            None
        }
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let resp = self.http.post(&url).json(&self.request(messages, false)).send().await?;
        let data = check_status(resp).await?.json::<ChatResponse>().await?;
        let message = data.message.ok_or_else(||
            LlmError::InvalidResponse("Ollama reply has no message".into())
        )?;
        Ok(CompletionResponse { response: message.content })
    }

    async fn stream_completion(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = serde_json::to_value(self.request(messages, true)).map_err(|e|
            LlmError::InvalidResponse(e.to_string())
        )?;
        let client = self.http.clone();
        debug!("Opening Ollama stream to {}", url);

        Ok(
            create_streaming_response(move |tx| async move {
                let response = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                };
                let response = match check_status(response).await {
                    Ok(r) => r,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                let mut stream = response.bytes_stream();
                let mut pending: Vec<u8> = Vec::new();
                while let Some(chunk_result) = stream.next().await {
                    match chunk_result {
                        Ok(chunk) => {
                            pending.extend_from_slice(&chunk);
                            for line in drain_lines(&mut pending) {
                                let Some((fragment, done)) = parse_stream_line(&line) else {
                                    continue;
                                };
                                if !fragment.is_empty() && tx.send(Ok(fragment)).await.is_err() {
                                    return;
                                }
                                if done {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e.into())).await;
                            return;
                        }
                    }
                }
            })
        )
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn supports_native_streaming(&self) -> bool {
        true
    }
}

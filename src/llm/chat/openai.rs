use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ check_status, create_streaming_response, drain_lines, ChatClient, CompletionResponse, TokenStream };
use crate::llm::{ LlmConfig, LlmError };
use crate::models::chat::ChatMessage;

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    endpoint: String,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
    #[serde(rename = "finish_reason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

/// Outcome of one SSE line of a chat-completions stream.
#[derive(Debug, PartialEq)]
enum StreamLine {
    Token(String),
    Finished,
    Skip,
}

fn parse_stream_line(line: &str) -> StreamLine {
    if line == "data: [DONE]" {
        return StreamLine::Finished;
    }
    let Some(data) = line.strip_prefix("data:") else {
        return StreamLine::Skip;
    };
    match serde_json::from_str::<OpenAIStreamResponse>(data.trim_start()) {
        Ok(stream_resp) => {
            let mut text = String::new();
            let mut finished = false;
            for choice in stream_resp.choices {
                if let Some(content) = choice.delta.content {
                    text.push_str(&content);
                }
                if choice.finish_reason.as_deref() == Some("stop") {
                    finished = true;
                }
            }
            if !text.is_empty() {
                StreamLine::Token(text)
            } else if finished {
                StreamLine::Finished
            } else {
                StreamLine::Skip
            }
        }
        Err(e) => {
            info!("JSON parse error: {} for data: {}", e, data);
            StreamLine::Skip
        }
    }
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        temperature: f32
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base = base.trim_end_matches('/');
        let endpoint = if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                LlmError::Config(format!("Invalid API key format: {}", e))
            )?
        );

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            model: chat_model,
            endpoint,
            temperature,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::Config("OpenAI API key is required".to_string()))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.temperature
        )
    }

    fn request(&self, messages: &[ChatMessage], stream: bool) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: self.temperature,
            max_tokens: Some(2048),
            stream: if stream { Some(true) } else { None },
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<CompletionResponse, LlmError> {
        let resp = self.http.post(&self.endpoint).json(&self.request(messages, false)).send().await?;
        let resp = check_status(resp).await?.json::<OpenAIResponse>().await?;

        let content = resp.choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No response from OpenAI API".to_string()))?
            .message.content;

        Ok(CompletionResponse { response: content })
    }

    async fn stream_completion(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        let req = self.request(messages, true);
        let client = self.http.clone();
        let url = self.endpoint.clone();
        debug!("Opening OpenAI stream to {}", url);

        Ok(
            create_streaming_response(move |tx| async move {
                let resp = match client.post(&url).json(&req).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                };
                let resp = match check_status(resp).await {
                    Ok(r) => r,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                let mut stream = resp.bytes_stream();
                let mut pending: Vec<u8> = Vec::new();
                while let Some(chunk_result) = stream.next().await {
                    match chunk_result {
                        Ok(chunk) => {
                            pending.extend_from_slice(&chunk);
                            for line in drain_lines(&mut pending) {
                                match parse_stream_line(&line) {
                                    StreamLine::Token(content) => {
                                        if tx.send(Ok(content)).await.is_err() {
                                            return;
                                        }
                                    }
                                    StreamLine::Finished => {
                                        return;
                                    }
                                    StreamLine::Skip => {}
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

    fn supports_native_streaming(&self) -> bool {
        true
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

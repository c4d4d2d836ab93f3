use async_trait::async_trait;
use log::info;
use ::rllm::{
    builder::{ LLMBackend, LLMBuilder },
    chat::{ ChatMessage as RllmMessage, ChatRole, MessageType },
};

use super::{ ChatClient, CompletionResponse };
use crate::llm::{ LlmConfig, LlmError, LlmType };
use crate::models::chat::{ ChatMessage, Role };

/// Hosted backends reached through the `rllm` builder. These do not stream
/// natively, so the trait's single-fragment stream is used.
pub struct HostedChatClient {
    backend: LLMBackend,
    api_key: String,
    model: String,
    base_url: Option<String>,
    temperature: f32,
}

fn backend_for(llm_type: &LlmType) -> Result<(LLMBackend, &'static str), LlmError> {
    match llm_type {
        LlmType::Anthropic => Ok((LLMBackend::Anthropic, "claude-3-5-haiku-latest")),
        LlmType::Gemini => Ok((LLMBackend::Google, "gemini-1.5-flash-latest")),
        LlmType::DeepSeek => Ok((LLMBackend::DeepSeek, "deepseek-chat")),
        LlmType::Groq => Ok((LLMBackend::Groq, "llama-3.1-8b-instant")),
        LlmType::XAI => Ok((LLMBackend::XAI, "grok-2-latest")),
        other =>
            Err(LlmError::Config(format!("LLM type '{}' is not served through rllm", other))),
    }
}

/// Splits role-tagged messages into the builder's system prompt and the
/// user/assistant turns `rllm` accepts.
fn split_messages(messages: &[ChatMessage]) -> (String, Vec<RllmMessage>) {
    let system = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let turns = messages
        .iter()
        .filter_map(|m| {
            let role = match m.role {
                Role::User => ChatRole::User,
                Role::Assistant => ChatRole::Assistant,
                Role::System => {
                    return None;
                }
            };
            Some(RllmMessage {
                role,
                content: m.content.clone(),
                message_type: MessageType::Text,
            })
        })
        .collect();
    (system, turns)
}

impl HostedChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let (backend, default_model) = backend_for(&config.llm_type)?;
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::Config(format!("{} API key is required", config.llm_type)))?;

        Ok(Self {
            backend,
            api_key,
            model: config.completion_model.clone().unwrap_or_else(|| default_model.to_string()),
            base_url: config.base_url.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatClient for HostedChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<CompletionResponse, LlmError> {
        let (system, turns) = split_messages(messages);

        let mut builder = LLMBuilder::new()
            .backend(self.backend.clone())
            .api_key(self.api_key.clone())
            .model(&self.model)
            .temperature(self.temperature)
            .stream(false);
        if !system.is_empty() {
            builder = builder.system(system);
        }
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url);
        }
        let provider = builder.build().map_err(|e| LlmError::Provider(e.to_string()))?;

        info!("HostedChatClient::complete() → model={} base_url={:?}", self.model, self.base_url);
        let resp = provider.chat(&turns).await.map_err(|e| LlmError::Provider(e.to_string()))?;
        let text = resp
            .text()
            .map(|s| s.to_string())
            .unwrap_or_else(|| resp.to_string());
        Ok(CompletionResponse { response: text })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

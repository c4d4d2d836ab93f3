//! One chat turn: augment the utterance with live data, stream the model's
//! reply, then fold the finished turn back into the session.

use futures::StreamExt;
use log::{ debug, error, info, warn };
use serde_json::{ json, Value as JsonValue };
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::prompt::{ fill, PromptConfig };
use crate::intent::{ self, ToolIntent };
use crate::llm::chat::ChatClient;
use crate::llm::LlmError;
use crate::models::chat::{ ChatMessage, ConversationState };
use crate::session::SessionHandle;
use crate::store::UserStore;
use crate::tools::DataAdapters;

pub const DEFAULT_SUMMARY_WINDOW: usize = 6;
const TURN_CHANNEL_CAPACITY: usize = 16;

/// What a caller sees of a turn: tokens, then exactly one `Done` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Token(String),
    Done,
    Error(String),
}

impl TurnEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnEvent::Token(_))
    }

    /// JSON body of the matching SSE frame.
    pub fn payload(&self) -> JsonValue {
        match self {
            TurnEvent::Token(token) => json!({ "token": token }),
            TurnEvent::Done => json!({ "done": true }),
            TurnEvent::Error(message) => json!({ "error": message }),
        }
    }
}

#[derive(Clone)]
pub struct ConversationEngine {
    chat_client: Arc<dyn ChatClient>,
    adapters: Arc<dyn DataAdapters>,
    prompts: Arc<PromptConfig>,
    store: Arc<dyn UserStore>,
    summary_window: usize,
}

impl ConversationEngine {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        adapters: Arc<dyn DataAdapters>,
        prompts: Arc<PromptConfig>,
        store: Arc<dyn UserStore>,
        summary_window: usize
    ) -> Self {
        Self { chat_client, adapters, prompts, store, summary_window }
    }

    /// Runs one turn in the background. Dropping the returned stream stops
    /// generation at the next token and discards the turn.
    pub fn stream_turn(&self, session: SessionHandle, input: String) -> ReceiverStream<TurnEvent> {
        let (tx, rx) = mpsc::channel(TURN_CHANNEL_CAPACITY);
        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_turn(session, input, tx).await;
        });
        ReceiverStream::new(rx)
    }

    async fn run_turn(&self, session: SessionHandle, input: String, tx: mpsc::Sender<TurnEvent>) {
        let mut state = session.lock_owned().await;
        let user_id = state.user_id.clone();

        let augmented = self.augment(&user_id, &input).await;
        let messages = self.build_prompt(&state, &augmented);

        let reply = match self.generate(&user_id, &messages, &tx).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                info!("Client for {} went away mid-turn, turn discarded", user_id);
                return;
            }
            Err(e) => {
                error!("Generation failed for {}: {}", user_id, e);
                let _ = tx.send(TurnEvent::Error(e.to_string())).await;
                return;
            }
        };

        state.push_turn(input.clone(), reply.clone());
        self.refresh_interest_summary(&mut state).await;

        if let Err(e) = self.store.save_chat(&user_id, &input, &reply).await {
            warn!("Failed to persist turn for {}: {}", user_id, e);
        }
        let _ = tx.send(TurnEvent::Done).await;
    }

    /// Appends adapter output to the utterance. Lookup failures leave it as is.
    async fn augment(&self, user_id: &str, input: &str) -> String {
        let intent = intent::extract(input);
        if intent.is_none() {
            return input.to_string();
        }
        debug!("Detected {} intent for {}", intent.name(), user_id);

        let annotation = match &intent {
            ToolIntent::None => None,
            ToolIntent::Weather(place) =>
                self.adapters
                    .weather(place).await
                    .map(|report| format!("[Weather Data: {}]", report.formatted()))
                    .map_err(|e| warn!("Weather lookup for '{}' failed: {}", place, e))
                    .ok(),
            ToolIntent::Flight { origin, destination } =>
                self.adapters
                    .flights(origin, destination, None).await
                    .map(|board| format!("[Flight Data:\n{}]", board.formatted()))
                    .map_err(|e| warn!("Flight lookup {} -> {} failed: {}", origin, destination, e))
                    .ok(),
            ToolIntent::Currency { amount, from, to } =>
                self.adapters
                    .convert(*amount, from, to).await
                    .map(|conversion| format!("[Currency: {}]", conversion.formatted()))
                    .map_err(|e| warn!("Currency conversion {} -> {} failed: {}", from, to, e))
                    .ok(),
        };

        match annotation {
            Some(annotation) => format!("{}\n\n{}", input, annotation),
            None => input.to_string(),
        }
    }

    fn build_prompt(&self, state: &ConversationState, input: &str) -> Vec<ChatMessage> {
        let mut system = self.prompts.persona.clone();
        if !state.interest_summary.is_empty() {
            system.push_str(
                &fill(&self.prompts.interest_context, &[("summary", state.interest_summary.as_str())])
            );
        }

        let mut messages = Vec::with_capacity(state.messages.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(state.messages.iter().cloned());
        messages.push(ChatMessage::user(input));
        messages
    }

    /// `Ok(None)` when the receiver was dropped before the reply finished.
    async fn generate(
        &self,
        user_id: &str,
        messages: &[ChatMessage],
        tx: &mpsc::Sender<TurnEvent>
    ) -> Result<Option<String>, LlmError> {
        let mut stream = self.chat_client.stream_completion(messages).await?;
        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            let token = chunk?;
            if token.is_empty() {
                continue;
            }
            reply.push_str(&token);
            if tx.send(TurnEvent::Token(token)).await.is_err() {
                return Ok(None);
            }
        }
        debug!("Streamed {} chars to {}", reply.len(), user_id);
        Ok(Some(reply))
    }

    async fn refresh_interest_summary(&self, state: &mut ConversationState) {
        let history = state.render_recent(self.summary_window);
        let request = fill(&self.prompts.summary_request, &[("history", history.as_str())]);
        let messages = [
            ChatMessage::system(self.prompts.summary_system.clone()),
            ChatMessage::user(request),
        ];
        match self.chat_client.complete(&messages).await {
            Ok(resp) => {
                state.interest_summary = resp.response.trim().to_string();
            }
            Err(e) => warn!("Keeping previous interest summary for {}: {}", state.user_id, e),
        }
    }
}

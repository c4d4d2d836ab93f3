use serde::{ Serialize, Deserialize };
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged message. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// In-memory conversation for one user.
///
/// History is append-only and grows by exactly one user and one assistant
/// message per completed turn. `interest_summary` stays empty until the first
/// successful recomputation and is always replaced wholesale.
#[derive(Clone, Debug)]
pub struct ConversationState {
    pub user_id: String,
    pub messages: Vec<ChatMessage>,
    pub interest_summary: String,
}

impl ConversationState {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            messages: Vec::new(),
            interest_summary: String::new(),
        }
    }

    pub fn push_turn(&mut self, user_message: impl Into<String>, assistant_message: impl Into<String>) {
        self.messages.push(ChatMessage::user(user_message));
        self.messages.push(ChatMessage::assistant(assistant_message));
    }

    pub fn recent(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Renders the last `n` user/assistant messages as `ROLE: text` lines.
    pub fn render_recent(&self, n: usize) -> String {
        self.recent(n)
            .iter()
            .filter(|msg| msg.role != Role::System)
            .map(|msg| format!("{}: {}", msg.role.as_str().to_uppercase(), msg.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

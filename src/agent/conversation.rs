//! Conversation history for a single dialogue

use chrono::{DateTime, Utc};

use super::llm::ChatMessage;
pub use crate::types::{Message, Role};

/// Ordered exchange with the model. The system prompt, when present, is
/// always the first message.
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a conversation that starts with a system prompt
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.add_message(Role::System, prompt);
        conversation
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        let message = Message::new(role, content);
        self.updated_at = message.timestamp;
        self.messages.push(message);
    }

    /// Replace the system prompt, inserting one if missing
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        match self.messages.first_mut() {
            Some(first) if first.role == Role::System => first.content = prompt,
            _ => self.messages.insert(0, Message::new(Role::System, prompt)),
        }
        self.updated_at = Utc::now();
    }

    /// History in wire format, followed by `pending` which is not recorded
    pub fn to_chat_messages(&self, pending: Option<&str>) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = self.messages.iter().map(ChatMessage::from).collect();
        if let Some(content) = pending {
            messages.push(ChatMessage::user(content));
        }
        messages
    }

    /// Most recent assistant reply, if any
    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Number of completed user turns
    pub fn turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

//! Feedback-aware conversational session
//!
//! Every question is sent with the user's feedback context appended, so
//! the model sees what worked before without any retraining. Judgments
//! flow back into the shared store and shape the next turn.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use super::conversation::{Conversation, Role};
use super::llm::{CompletionRequest, LanguageModel};
use crate::error::Result;
use crate::feedback::context::augment_prompt;
use crate::feedback::{ContextBuilder, FeedbackContext, FeedbackStore, FeedbackSummary};

/// Default system prompt for the feedback-aware assistant
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful enterprise AI assistant that learns from user feedback.

Your goals:
1. Provide clear, accurate, and helpful responses
2. Learn from user feedback to improve future responses
3. Maintain consistency with organizational standards
4. Adapt your tone and terminology based on user preferences

Guidelines:
- Be concise and direct
- Use organizational terminology when appropriate
- Acknowledge feedback and improve accordingly
- Maintain a professional yet friendly tone";

/// The query and answer of the most recent turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub query: String,
    pub response: String,
}

/// One user's ongoing dialogue, biased by their stored feedback
pub struct FeedbackAwareSession {
    user_id: String,
    model: Arc<dyn LanguageModel>,
    context: ContextBuilder,
    instructions: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    /// Created on the first `ask`
    conversation: Option<Conversation>,
    last_exchange: Option<Exchange>,
}

impl FeedbackAwareSession {
    pub fn new(user_id: impl Into<String>, model: Arc<dyn LanguageModel>, store: FeedbackStore) -> Self {
        Self {
            user_id: user_id.into(),
            model,
            context: ContextBuilder::new(store),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            max_tokens: None,
            temperature: None,
            conversation: None,
            last_exchange: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_context_builder(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn store(&self) -> &FeedbackStore {
        self.context.store()
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    pub fn last_exchange(&self) -> Option<&Exchange> {
        self.last_exchange.as_ref()
    }

    /// Ask a question and return the model's raw text.
    ///
    /// The history keeps the plain question; only the outgoing copy of the
    /// current turn carries the feedback context. A failed call leaves the
    /// history untouched.
    pub async fn ask(&mut self, user_input: &str) -> Result<String> {
        let conversation = self.conversation.get_or_insert_with(|| {
            let conversation = Conversation::with_system_prompt(self.instructions.clone());
            info!("Started conversation {} for {}", conversation.id, self.user_id);
            conversation
        });

        let feedback_context = self.context.build_context(&self.user_id).await?;
        let prompt = augment_prompt(user_input, &feedback_context);
        debug!(
            "Forwarding turn {} ({} chars of feedback context)",
            conversation.turns() + 1,
            feedback_context.len()
        );

        let request = CompletionRequest::new(conversation.to_chat_messages(Some(&prompt)))
            .max_tokens(self.max_tokens)
            .temperature(self.temperature);
        let response = self.model.complete(request).await?;

        conversation.add_message(Role::User, user_input);
        conversation.add_message(Role::Assistant, response.clone());
        self.last_exchange = Some(Exchange {
            query: user_input.to_string(),
            response: response.clone(),
        });

        Ok(response)
    }

    /// Store a judgment of an exchange for this session's user
    pub async fn record_feedback(&self, query: &str, response: &str, helpful: bool) -> Result<String> {
        let mut context = FeedbackContext::new();
        context.insert("feedback_session".to_string(), json!(true));
        context.insert("improvement_needed".to_string(), json!(!helpful));

        let id = self
            .store()
            .store(&self.user_id, query, response, helpful, Some(context))
            .await?;
        info!("Recorded {} feedback for {}", if helpful { "helpful" } else { "not helpful" }, self.user_id);
        Ok(id)
    }

    /// Judge the most recent exchange. Returns `None` before the first answer.
    pub async fn judge_last(&self, helpful: bool) -> Result<Option<String>> {
        match &self.last_exchange {
            Some(exchange) => self
                .record_feedback(&exchange.query, &exchange.response, helpful)
                .await
                .map(Some),
            None => Ok(None),
        }
    }

    pub async fn summary(&self) -> Result<FeedbackSummary> {
        self.store().summarize(&self.user_id).await
    }
}

//! Adaptive session driven by a preference policy
//!
//! The policy is rendered into the system prompt before each call. After
//! each call the user's message is read back as feedback on the previous
//! answer; a usable rating updates the policy, anything else leaves it
//! alone. Extraction problems are never surfaced to the caller.

use std::sync::Arc;
use tracing::{debug, warn};

use super::conversation::{Conversation, Role};
use super::llm::{CompletionRequest, LanguageModel};
use crate::error::Result;
use crate::policy::{ExtractionOutcome, PreferencePolicy, RatingExtractor};

pub const DEFAULT_ADAPTIVE_INSTRUCTIONS: &str = "You are a helpful assistant that learns from user feedback.";

pub struct AdaptiveSession {
    model: Arc<dyn LanguageModel>,
    extractor: RatingExtractor,
    policy: PreferencePolicy,
    instructions: String,
    max_tokens: Option<u32>,
    conversation: Conversation,
    last_extraction: Option<ExtractionOutcome>,
}

impl AdaptiveSession {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self::with_policy(model, PreferencePolicy::default())
    }

    /// Resume with a previously learned policy
    pub fn with_policy(model: Arc<dyn LanguageModel>, policy: PreferencePolicy) -> Self {
        Self {
            extractor: RatingExtractor::new(model.clone()),
            model,
            policy,
            instructions: DEFAULT_ADAPTIVE_INSTRUCTIONS.to_string(),
            max_tokens: None,
            conversation: Conversation::new(),
            last_extraction: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn policy(&self) -> &PreferencePolicy {
        &self.policy
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Outcome of the extraction that followed the latest `ask`
    pub fn last_extraction(&self) -> Option<&ExtractionOutcome> {
        self.last_extraction.as_ref()
    }

    /// System prompt as it will be sent on the next turn
    pub fn system_prompt(&self) -> String {
        format!("{}\n\n{}", self.instructions, self.policy.instructions())
    }

    /// Answer `user_input` under the current policy, then learn from it.
    ///
    /// Only the completion call can fail; extraction runs afterwards and
    /// its outcome is kept in `last_extraction`.
    pub async fn ask(&mut self, user_input: &str) -> Result<String> {
        debug!(
            "Policy: depth={}, length={}, feedback={}, win_rate={:.0}%",
            self.policy.technical_depth,
            self.policy.response_length,
            self.policy.feedback_count,
            self.policy.win_rate()
        );

        let system_prompt = self.system_prompt();
        self.conversation.set_system_prompt(system_prompt);
        let request = CompletionRequest::new(self.conversation.to_chat_messages(Some(user_input)))
            .max_tokens(self.max_tokens);
        let response = self.model.complete(request).await?;

        let previous = self.conversation.last_assistant_message().map(|m| m.content.clone());
        self.conversation.add_message(Role::User, user_input);
        self.conversation.add_message(Role::Assistant, response.clone());

        let outcome = self.observe(previous.as_deref(), user_input).await;
        self.last_extraction = Some(outcome);

        Ok(response)
    }

    /// Read a message as feedback and fold any rating into the policy
    pub async fn observe(&mut self, previous_response: Option<&str>, user_message: &str) -> ExtractionOutcome {
        let outcome = self.extractor.extract(previous_response, user_message).await;
        match &outcome {
            Ok(Some(feedback)) => self.policy.apply(feedback),
            Ok(None) => debug!("No rating in user message"),
            Err(e) => warn!("Rating extraction failed, policy unchanged: {}", e),
        }
        outcome
    }

    /// Learned policy as text, for restoring a later session
    pub fn serialize_policy(&self) -> String {
        self.policy.serialize()
    }
}

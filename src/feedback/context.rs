//! Feedback context builder
//!
//! Turns a user's feedback summary and a few helpful exchanges into an
//! instruction block appended to the next prompt. Record text is embedded
//! verbatim: it is untrusted input crossing the prompt boundary, and callers
//! must treat the result accordingly.

use tracing::debug;

use super::{FeedbackRecord, FeedbackStore, FeedbackSummary};
use crate::error::Result;

/// Default number of helpful exchanges quoted as examples
pub const DEFAULT_EXAMPLE_LIMIT: usize = 3;

/// Builds prompt augmentation from stored feedback
#[derive(Clone)]
pub struct ContextBuilder {
    store: FeedbackStore,
    example_limit: usize,
}

impl ContextBuilder {
    pub fn new(store: FeedbackStore) -> Self {
        Self {
            store,
            example_limit: DEFAULT_EXAMPLE_LIMIT,
        }
    }

    pub fn with_example_limit(mut self, limit: usize) -> Self {
        self.example_limit = limit;
        self
    }

    pub fn store(&self) -> &FeedbackStore {
        &self.store
    }

    /// Augmentation text for the user's next prompt; empty when there is
    /// no history at all.
    pub async fn build_context(&self, user_id: &str) -> Result<String> {
        let summary = self.store.summarize(user_id).await?;
        let examples = self.store.helpful_examples(user_id, self.example_limit).await?;
        let context = render_context(&summary, &examples);

        debug!(
            "Built feedback context for {}: {} interactions, {} examples, {} chars",
            user_id,
            summary.total_interactions,
            examples.len(),
            context.len()
        );
        Ok(context)
    }
}

/// Render the stats block and the example block, each only when it has
/// something to say.
pub fn render_context(summary: &FeedbackSummary, examples: &[FeedbackRecord]) -> String {
    let mut parts = Vec::new();

    if summary.total_interactions > 0 {
        parts.push(format!(
            "\n[FEEDBACK LEARNING]\n\
             Based on {} past interactions:\n\
             - User found {} responses helpful\n\
             - User found {} responses unhelpful\n\
             - Success rate: {}\n\
             \nAdjust your response style based on what worked before.",
            summary.total_interactions,
            summary.helpful_count,
            summary.not_helpful_count,
            summary.ratio_percent(),
        ));
    }

    if !examples.is_empty() {
        parts.push("\n[EXAMPLES OF HELPFUL RESPONSES]".to_string());
        for example in examples {
            parts.push(format!("\nQ: {}\nA: {}", example.query, example.response));
        }
    }

    parts.concat()
}

/// Append feedback context to a user prompt. An empty context leaves the
/// input untouched.
pub fn augment_prompt(user_input: &str, context: &str) -> String {
    if context.is_empty() {
        user_input.to_string()
    } else {
        format!("{}\n\n[FEEDBACK CONTEXT:{}]", user_input, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_history_means_no_context() {
        let builder = ContextBuilder::new(FeedbackStore::in_memory());
        assert_eq!(builder.build_context("nobody").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_context_quotes_helpful_pairs_and_ratio() {
        let store = FeedbackStore::in_memory();
        store.store("u1", "Explain AI", "AI is a field...", false, None).await.unwrap();
        store.store("u1", "What is ML?", "ML is a subset of AI.", true, None).await.unwrap();

        let context = ContextBuilder::new(store).build_context("u1").await.unwrap();

        assert!(context.contains("Based on 2 past interactions"));
        assert!(context.contains("- User found 1 responses helpful"));
        assert!(context.contains("- User found 1 responses unhelpful"));
        assert!(context.contains("Success rate: 50.0%"));
        assert!(context.contains("\nQ: What is ML?\nA: ML is a subset of AI."));
        assert!(!context.contains("Explain AI"));
    }

    #[tokio::test]
    async fn test_example_limit() {
        let store = FeedbackStore::in_memory();
        for i in 0..5 {
            store.store("u1", &format!("question {i}"), "answer", true, None).await.unwrap();
        }

        let context = ContextBuilder::new(store)
            .with_example_limit(2)
            .build_context("u1")
            .await
            .unwrap();
        assert_eq!(context.matches("\nQ: ").count(), 2);
        assert!(context.contains("question 4"));
        assert!(context.contains("question 3"));
    }

    #[test]
    fn test_unhelpful_only_history_has_no_example_block() {
        let summary = FeedbackSummary {
            total_interactions: 1,
            helpful_count: 0,
            not_helpful_count: 1,
            helpful_ratio: 0.0,
        };
        let context = render_context(&summary, &[]);
        assert!(context.starts_with("\n[FEEDBACK LEARNING]"));
        assert!(context.contains("Success rate: 0.0%"));
        assert!(!context.contains("[EXAMPLES OF HELPFUL RESPONSES]"));
    }

    #[test]
    fn test_augment_prompt() {
        assert_eq!(augment_prompt("hi", ""), "hi");
        assert_eq!(augment_prompt("hi", "\nctx"), "hi\n\n[FEEDBACK CONTEXT:\nctx]");
    }
}

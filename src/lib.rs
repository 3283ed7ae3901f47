//! Feedback Agent - conversational assistant that learns from user judgments
//!
//! Nothing here retrains a model. Instead:
//! - every helpful / not-helpful judgment is stored per user
//! - the next prompt carries a summary of past judgments and a few
//!   exchanges the user found helpful
//! - an adaptive variant keeps a small preference policy (technical depth,
//!   response length) updated from free-text feedback
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use feedback_agent::{ChatClient, FeedbackAwareSession, FeedbackStore, ProviderConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let model = Arc::new(ChatClient::new(ProviderConfig::openai(key, "gpt-4o-mini")));
//!     let mut session = FeedbackAwareSession::new("u1", model, FeedbackStore::in_memory());
//!     let answer = session.ask("How do I reset my password?").await?;
//!     session.judge_last(true).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod types;
pub mod feedback;
pub mod policy;
pub mod agent;
pub mod config;
pub mod cli;

pub use error::{Error, ExtractionFailure, Result};

pub use feedback::{
    ContextBuilder,
    FeedbackBackend,
    FeedbackRecord,
    FeedbackStore,
    FeedbackSummary,
    InMemoryFeedbackBackend,
    SqliteFeedbackBackend,
};

pub use agent::{
    AdaptiveSession,
    ChatClient,
    CompletionRequest,
    FeedbackAwareSession,
    LanguageModel,
    ProviderConfig,
};

pub use policy::{PreferencePolicy, RatedFeedback, ResponseLength, TechnicalDepth};

pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Cut `s` to at most `max_chars` characters, marking the cut with `...`
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 80), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("héllo wörld", 4), "héll...");
    }
}

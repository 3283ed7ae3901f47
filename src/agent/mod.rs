//! Agent module - model boundary and conversational sessions

pub mod adaptive;
pub mod conversation;
pub mod llm;
pub mod session;

pub use adaptive::AdaptiveSession;
pub use conversation::Conversation;
pub use llm::{ChatClient, ChatMessage, CompletionRequest, LanguageModel, ProviderConfig};
pub use session::{Exchange, FeedbackAwareSession};

//! Feedback store facade over a document-style backend
//!
//! The backend is injected so the same store code runs against SQLite in
//! the CLI and against an in-memory fake in tests. Reads are plain
//! snapshots: nothing here locks across a query and a later write.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{FeedbackContext, FeedbackRecord, FeedbackSummary};
use crate::error::Result;

/// Number of most recent records a summary is computed over
pub const SUMMARY_WINDOW: usize = 100;

/// Query filter at the storage boundary. Results are always ordered by
/// timestamp, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackFilter {
    pub user_id: String,
    /// `Some(true)` keeps only helpful records
    pub helpful: Option<bool>,
}

impl FeedbackFilter {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            helpful: None,
        }
    }

    pub fn helpful_only(mut self) -> Self {
        self.helpful = Some(true);
        self
    }

    pub fn matches(&self, record: &FeedbackRecord) -> bool {
        record.user_id == self.user_id && self.helpful.map_or(true, |h| record.helpful == h)
    }
}

/// Document store holding feedback records, partitioned by user id
#[async_trait]
pub trait FeedbackBackend: Send + Sync {
    /// Durably write one record
    async fn create(&self, record: &FeedbackRecord) -> Result<()>;

    /// Up to `limit` records matching `filter`, newest first
    async fn query(&self, filter: &FeedbackFilter, limit: usize) -> Result<Vec<FeedbackRecord>>;
}

/// Shared handle to the feedback records of every user
#[derive(Clone)]
pub struct FeedbackStore {
    backend: Arc<dyn FeedbackBackend>,
    summary_window: usize,
}

impl FeedbackStore {
    pub fn new(backend: Arc<dyn FeedbackBackend>) -> Self {
        Self {
            backend,
            summary_window: SUMMARY_WINDOW,
        }
    }

    /// Store backed by a fresh in-memory backend
    pub fn in_memory() -> Self {
        Self::new(Arc::new(super::InMemoryFeedbackBackend::new()))
    }

    pub fn with_summary_window(mut self, window: usize) -> Self {
        self.summary_window = window;
        self
    }

    /// Record a judgment and return the new record's id.
    ///
    /// A single write; failures come back as `StorageUnavailable` and are
    /// not retried.
    pub async fn store(
        &self,
        user_id: &str,
        query: &str,
        response: &str,
        helpful: bool,
        context: Option<FeedbackContext>,
    ) -> Result<String> {
        let record = FeedbackRecord::new(user_id, query, response, helpful, context.unwrap_or_default());
        self.backend.create(&record).await?;
        debug!(
            "Stored feedback {} for user {} ({})",
            record.id,
            user_id,
            record.feedback_type()
        );
        Ok(record.id)
    }

    /// Up to `limit` of the user's records, most recent first
    pub async fn recent_history(&self, user_id: &str, limit: usize) -> Result<Vec<FeedbackRecord>> {
        self.backend.query(&FeedbackFilter::user(user_id), limit).await
    }

    /// Up to `limit` of the user's helpful records, most recent first
    pub async fn helpful_examples(&self, user_id: &str, limit: usize) -> Result<Vec<FeedbackRecord>> {
        self.backend
            .query(&FeedbackFilter::user(user_id).helpful_only(), limit)
            .await
    }

    /// Counts and ratio over the recent window, recomputed on every call
    pub async fn summarize(&self, user_id: &str) -> Result<FeedbackSummary> {
        let history = self.recent_history(user_id, self.summary_window).await?;
        Ok(FeedbackSummary::from_records(&history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Unreachable;

    #[async_trait]
    impl FeedbackBackend for Unreachable {
        async fn create(&self, _record: &FeedbackRecord) -> Result<()> {
            Err(Error::storage("connection refused"))
        }

        async fn query(&self, _filter: &FeedbackFilter, _limit: usize) -> Result<Vec<FeedbackRecord>> {
            Err(Error::storage("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_store_then_read_back() {
        let store = FeedbackStore::in_memory();
        let id = store.store("u1", "Explain AI", "AI is...", true, None).await.unwrap();

        let history = store.recent_history("u1", 1).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, id);
        assert_eq!(history[0].query, "Explain AI");
        assert_eq!(history[0].response, "AI is...");
        assert!(history[0].helpful);
    }

    #[tokio::test]
    async fn test_unknown_user_has_empty_history() {
        let store = FeedbackStore::in_memory();
        store.store("u1", "q", "r", true, None).await.unwrap();

        assert!(store.recent_history("u2", 10).await.unwrap().is_empty());
        assert!(store.helpful_examples("u2", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_window_bounds_total() {
        let store = FeedbackStore::in_memory().with_summary_window(3);
        for i in 0..5 {
            store.store("u1", &format!("q{i}"), "r", i % 2 == 0, None).await.unwrap();
        }

        let summary = store.summarize("u1").await.unwrap();
        assert_eq!(summary.total_interactions, 3);
        assert_eq!(summary.helpful_count + summary.not_helpful_count, 3);
    }

    #[tokio::test]
    async fn test_backend_failure_is_propagated() {
        let store = FeedbackStore::new(Arc::new(Unreachable));
        let err = store.store("u1", "q", "r", true, None).await.unwrap_err();
        assert!(err.is_storage());
        assert!(store.summarize("u1").await.unwrap_err().is_storage());
    }

    #[test]
    fn test_filter_matching() {
        let rec = FeedbackRecord::new("u1", "q", "r", false, FeedbackContext::new());
        assert!(FeedbackFilter::user("u1").matches(&rec));
        assert!(!FeedbackFilter::user("u1").helpful_only().matches(&rec));
        assert!(!FeedbackFilter::user("u2").matches(&rec));
    }
}

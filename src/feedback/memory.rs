//! In-memory feedback backend.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{FeedbackBackend, FeedbackFilter};
use super::FeedbackRecord;
use crate::error::Result;

/// Process-local backend. Useful for tests and throwaway sessions.
#[derive(Default)]
pub struct InMemoryFeedbackBackend {
    records: RwLock<Vec<FeedbackRecord>>,
}

impl InMemoryFeedbackBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-populated with records, e.g. imported history
    pub fn with_records(records: impl IntoIterator<Item = FeedbackRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().collect()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl FeedbackBackend for InMemoryFeedbackBackend {
    async fn create(&self, record: &FeedbackRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn query(&self, filter: &FeedbackFilter, limit: usize) -> Result<Vec<FeedbackRecord>> {
        let records = self.records.read().await;
        // Later inserts win ties on equal timestamps; the sort is stable.
        let mut matching: Vec<FeedbackRecord> = records
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::FeedbackContext;
    use chrono::{Duration, Utc};

    fn at(query: &str, helpful: bool, minutes_ago: i64) -> FeedbackRecord {
        let mut rec = FeedbackRecord::new("u1", query, "r", helpful, FeedbackContext::new());
        rec.timestamp = Utc::now() - Duration::minutes(minutes_ago);
        rec
    }

    #[tokio::test]
    async fn test_newest_first_regardless_of_insert_order() {
        let backend = InMemoryFeedbackBackend::with_records([
            at("middle", true, 5),
            at("newest", false, 1),
            at("oldest", true, 10),
        ]);

        let found = backend.query(&FeedbackFilter::user("u1"), 10).await.unwrap();
        let queries: Vec<&str> = found.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(queries, vec!["newest", "middle", "oldest"]);
    }

    #[tokio::test]
    async fn test_helpful_filter_and_limit() {
        let backend = InMemoryFeedbackBackend::new();
        for (i, helpful) in [true, false, true, true].into_iter().enumerate() {
            backend.create(&at(&format!("q{i}"), helpful, 10 - i as i64)).await.unwrap();
        }
        assert_eq!(backend.len().await, 4);

        let found = backend
            .query(&FeedbackFilter::user("u1").helpful_only(), 2)
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|r| r.helpful));
        assert_eq!(found[0].query, "q3");
    }
}

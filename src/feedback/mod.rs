//! Feedback records and the stores that hold them
//!
//! Provides:
//! - `FeedbackRecord`: one judged query/response exchange
//! - `FeedbackSummary`: counts and helpful ratio over a recent window
//! - `FeedbackStore`: the facade sessions use, over a pluggable backend
//! - SQLite and in-memory backends
//! - `ContextBuilder`: turns history into prompt augmentation text

pub mod context;
pub mod memory;
pub mod sqlite;
pub mod store;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use context::ContextBuilder;
pub use memory::InMemoryFeedbackBackend;
pub use sqlite::SqliteFeedbackBackend;
pub use store::{FeedbackBackend, FeedbackFilter, FeedbackStore, SUMMARY_WINDOW};

/// Auxiliary tags attached to a record, e.g. `improvement_needed`
pub type FeedbackContext = BTreeMap<String, serde_json::Value>;

/// Label derived from the helpful flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Helpful,
    NotHelpful,
}

impl FeedbackType {
    pub fn from_helpful(helpful: bool) -> Self {
        if helpful {
            FeedbackType::Helpful
        } else {
            FeedbackType::NotHelpful
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Helpful => "helpful",
            FeedbackType::NotHelpful => "not_helpful",
        }
    }
}

impl std::fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored judgment of a single query/response exchange.
///
/// Immutable once created; the store never updates or deletes records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub user_id: String,
    pub query: String,
    pub response: String,
    /// `true` = helpful
    #[serde(rename = "feedback")]
    pub helpful: bool,
    #[serde(default)]
    pub context: FeedbackContext,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Create a record with a fresh id and the current time
    pub fn new(
        user_id: impl Into<String>,
        query: impl Into<String>,
        response: impl Into<String>,
        helpful: bool,
        context: FeedbackContext,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            query: query.into(),
            response: response.into(),
            helpful,
            context,
            // Stored precision is microseconds
            timestamp: Utc::now().trunc_subsecs(6),
        }
    }

    pub fn feedback_type(&self) -> FeedbackType {
        FeedbackType::from_helpful(self.helpful)
    }

    /// Timestamp as stored: RFC 3339 UTC with microseconds, so string
    /// order matches time order.
    pub fn timestamp_string(&self) -> String {
        format_timestamp(&self.timestamp)
    }

    /// The document written at the storage boundary
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "user_id": self.user_id,
            "query": self.query,
            "response": self.response,
            "feedback": self.helpful,
            "feedback_type": self.feedback_type().as_str(),
            "timestamp": self.timestamp_string(),
            "context": self.context,
        })
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Statistics over a user's most recent records. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub total_interactions: usize,
    pub helpful_count: usize,
    pub not_helpful_count: usize,
    pub helpful_ratio: f64,
}

impl FeedbackSummary {
    pub fn from_records(records: &[FeedbackRecord]) -> Self {
        let total_interactions = records.len();
        let helpful_count = records.iter().filter(|r| r.helpful).count();
        let helpful_ratio = if total_interactions > 0 {
            helpful_count as f64 / total_interactions as f64
        } else {
            0.0
        };

        Self {
            total_interactions,
            helpful_count,
            not_helpful_count: total_interactions - helpful_count,
            helpful_ratio,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_interactions == 0
    }

    /// Helpful ratio as a percentage string, e.g. `50.0%`
    pub fn ratio_percent(&self) -> String {
        format!("{:.1}%", self.helpful_ratio * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(helpful: bool) -> FeedbackRecord {
        FeedbackRecord::new("u1", "q", "r", helpful, FeedbackContext::new())
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = FeedbackSummary::from_records(&[]);
        assert_eq!(summary, FeedbackSummary::default());
        assert_eq!(summary.helpful_ratio, 0.0);
        assert!(summary.is_empty());
    }

    #[test]
    fn test_summary_counts_add_up() {
        let records = vec![record(true), record(false), record(true), record(true)];
        let summary = FeedbackSummary::from_records(&records);
        assert_eq!(summary.total_interactions, 4);
        assert_eq!(summary.helpful_count, 3);
        assert_eq!(summary.not_helpful_count, 1);
        assert_eq!(summary.helpful_ratio, 0.75);
        assert_eq!(summary.ratio_percent(), "75.0%");
    }

    #[test]
    fn test_records_get_distinct_ids() {
        assert_ne!(record(true).id, record(true).id);
    }

    #[test]
    fn test_document_shape() {
        let mut context = FeedbackContext::new();
        context.insert("improvement_needed".into(), serde_json::json!(true));
        let rec = FeedbackRecord::new("u1", "Explain AI", "AI is...", false, context);
        let doc = rec.to_document();

        assert_eq!(doc["user_id"], "u1");
        assert_eq!(doc["feedback"], false);
        assert_eq!(doc["feedback_type"], "not_helpful");
        assert_eq!(doc["context"]["improvement_needed"], true);
        assert!(doc["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}

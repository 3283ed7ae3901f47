//! Preference policy learned from free-text feedback
//!
//! A small record of inferred style preferences, mutated by keyword rules
//! after each rated turn. There is no reward model here: a rating bumps
//! counters and the suggestion text is matched against fixed phrases.
//!
//! Matching is first-match-wins inside each rule group, so a suggestion
//! like "simpler, not advanced" resolves to `advanced`. That precedence is
//! a known limitation of the heuristic and is kept as is.

pub mod extraction;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use extraction::{ExtractionOutcome, RatingExtractor};

/// How technical explanations should be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechnicalDepth {
    Basic,
    #[default]
    Medium,
    Advanced,
}

impl TechnicalDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            TechnicalDepth::Basic => "basic",
            TechnicalDepth::Medium => "medium",
            TechnicalDepth::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for TechnicalDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long responses should be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLength {
    Concise,
    #[default]
    Balanced,
    Detailed,
}

impl ResponseLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseLength::Concise => "concise",
            ResponseLength::Balanced => "balanced",
            ResponseLength::Detailed => "detailed",
        }
    }
}

impl std::fmt::Display for ResponseLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rating pulled out of the user's reply, with an optional suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatedFeedback {
    /// 1..=5
    pub rating: u8,
    pub suggestion: Option<String>,
}

impl RatedFeedback {
    pub fn new(rating: u8, suggestion: Option<&str>) -> Self {
        Self {
            rating,
            suggestion: suggestion.map(str::to_string),
        }
    }

    pub fn is_positive(&self) -> bool {
        self.rating >= 4
    }
}

/// Learned style preferences for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferencePolicy {
    #[serde(default)]
    pub technical_depth: TechnicalDepth,
    #[serde(default = "default_true")]
    pub prefer_examples: bool,
    #[serde(default)]
    pub response_length: ResponseLength,
    #[serde(default)]
    pub feedback_count: u32,
    #[serde(default)]
    pub positive_feedback: u32,
}

fn default_true() -> bool {
    true
}

impl Default for PreferencePolicy {
    fn default() -> Self {
        Self {
            technical_depth: TechnicalDepth::default(),
            prefer_examples: true,
            response_length: ResponseLength::default(),
            feedback_count: 0,
            positive_feedback: 0,
        }
    }
}

impl PreferencePolicy {
    /// Fold one rated turn into the policy
    pub fn apply(&mut self, feedback: &RatedFeedback) {
        self.feedback_count += 1;
        if feedback.is_positive() {
            self.positive_feedback += 1;
        }

        if let Some(suggestion) = feedback.suggestion.as_deref() {
            self.apply_suggestion(suggestion);
        }

        info!(
            "Policy updated: depth={}, length={}, feedback={}, win_rate={:.0}%",
            self.technical_depth,
            self.response_length,
            self.feedback_count,
            self.win_rate()
        );
    }

    /// Keyword rules over suggestion text. Does not touch the counters.
    pub fn apply_suggestion(&mut self, suggestion: &str) {
        let text = suggestion.to_lowercase();

        if text.contains("more detailed") || text.contains("more code") {
            self.response_length = ResponseLength::Detailed;
        } else if text.contains("shorter") || text.contains("concise") {
            self.response_length = ResponseLength::Concise;
        }

        if text.contains("advanced") {
            self.technical_depth = TechnicalDepth::Advanced;
        } else if text.contains("simpler") || text.contains("basic") {
            self.technical_depth = TechnicalDepth::Basic;
        }
    }

    /// Positive share of rated turns, in percent
    pub fn win_rate(&self) -> f64 {
        if self.feedback_count == 0 {
            0.0
        } else {
            self.positive_feedback as f64 / self.feedback_count as f64 * 100.0
        }
    }

    /// The policy rendered as system instructions
    pub fn instructions(&self) -> String {
        let mut lines = vec![
            format!("Technical level: provide {} explanations.", self.technical_depth),
            format!("Response style: keep responses {}.", self.response_length),
        ];
        if self.prefer_examples {
            lines.push("Include practical code examples when relevant.".to_string());
        }
        lines.join(" ")
    }

    pub fn serialize(&self) -> String {
        // Plain enums and integers; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn restore(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = PreferencePolicy::default();
        assert_eq!(policy.technical_depth, TechnicalDepth::Medium);
        assert_eq!(policy.response_length, ResponseLength::Balanced);
        assert!(policy.prefer_examples);
        assert_eq!(policy.win_rate(), 0.0);
    }

    #[test]
    fn test_simpler_then_advanced() {
        let mut policy = PreferencePolicy::default();
        policy.apply(&RatedFeedback::new(2, Some("Could you make it simpler?")));
        assert_eq!(policy.technical_depth, TechnicalDepth::Basic);

        policy.apply(&RatedFeedback::new(4, Some("Now I want the advanced version")));
        assert_eq!(policy.technical_depth, TechnicalDepth::Advanced);
        assert_eq!(policy.feedback_count, 2);
        assert_eq!(policy.positive_feedback, 1);
        assert_eq!(policy.win_rate(), 50.0);
    }

    #[test]
    fn test_first_match_wins() {
        let mut policy = PreferencePolicy::default();
        policy.apply_suggestion("simpler please, the advanced bits lost me");
        assert_eq!(policy.technical_depth, TechnicalDepth::Advanced);

        policy.apply_suggestion("More detailed but also shorter sentences");
        assert_eq!(policy.response_length, ResponseLength::Detailed);

        policy.apply_suggestion("Too long, I prefer CONCISE explanations");
        assert_eq!(policy.response_length, ResponseLength::Concise);
    }

    #[test]
    fn test_rating_without_suggestion_only_counts() {
        let mut policy = PreferencePolicy::default();
        policy.apply(&RatedFeedback::new(5, None));
        assert_eq!(policy.feedback_count, 1);
        assert_eq!(policy.positive_feedback, 1);
        assert_eq!(policy.technical_depth, TechnicalDepth::Medium);
        assert_eq!(policy.response_length, ResponseLength::Balanced);
    }

    #[test]
    fn test_instructions() {
        let mut policy = PreferencePolicy::default();
        assert_eq!(
            policy.instructions(),
            "Technical level: provide medium explanations. \
             Response style: keep responses balanced. \
             Include practical code examples when relevant."
        );

        policy.prefer_examples = false;
        policy.response_length = ResponseLength::Concise;
        assert_eq!(
            policy.instructions(),
            "Technical level: provide medium explanations. Response style: keep responses concise."
        );
    }

    #[test]
    fn test_serialize_restore() {
        let mut policy = PreferencePolicy::default();
        policy.apply(&RatedFeedback::new(5, Some("more code please, advanced")));

        let text = policy.serialize();
        assert!(text.contains("\"technical_depth\":\"advanced\""));
        assert_eq!(PreferencePolicy::restore(&text).unwrap(), policy);

        let partial = PreferencePolicy::restore(r#"{"response_length":"concise"}"#).unwrap();
        assert_eq!(partial.response_length, ResponseLength::Concise);
        assert!(partial.prefer_examples);
    }
}

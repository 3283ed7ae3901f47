//! Best-effort rating extraction
//!
//! Asks the model to read the user's latest message as feedback on the
//! previous answer. Callers get an explicit outcome so "no rating given"
//! and "extraction broke" stay distinguishable, even though the adaptive
//! session treats both as "leave the policy alone".

use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::RatedFeedback;
use crate::agent::llm::{ChatMessage, CompletionRequest, LanguageModel};
use crate::error::ExtractionFailure;

/// `Ok(None)` = the message carried no rating
pub type ExtractionOutcome = Result<Option<RatedFeedback>, ExtractionFailure>;

const EXTRACTION_INSTRUCTIONS: &str = "Extract feedback rating (1-5) about the previous response. \
If user gives thumbs up/positive feedback, rate 5. If negative, rate 1. If mixed, rate 3. \
If no clear feedback, return null. Respond only with a JSON object of the form \
{\"rating\": <1-5 or null>, \"suggestion\": <how to improve the response, or null>}.";

#[derive(Debug, Deserialize)]
struct RawFeedback {
    #[serde(default)]
    rating: Option<i64>,
    #[serde(default)]
    suggestion: Option<String>,
}

/// Turns free text into an optional `RatedFeedback` via the model
#[derive(Clone)]
pub struct RatingExtractor {
    model: Arc<dyn LanguageModel>,
}

impl RatingExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Read `user_message` as feedback on `previous_response` (if any)
    pub async fn extract(&self, previous_response: Option<&str>, user_message: &str) -> ExtractionOutcome {
        let mut messages = vec![ChatMessage::system(EXTRACTION_INSTRUCTIONS)];
        if let Some(previous) = previous_response {
            messages.push(ChatMessage::assistant(previous));
        }
        messages.push(ChatMessage::user(user_message));

        let request = CompletionRequest::new(messages)
            .temperature(Some(0.0))
            .json_schema("user_feedback", feedback_schema());

        let text = self
            .model
            .complete(request)
            .await
            .map_err(ExtractionFailure::Model)?;

        let outcome = parse_feedback(&text);
        debug!("Rating extraction outcome: {:?}", outcome);
        outcome
    }
}

/// JSON schema for the structured-output request
pub fn feedback_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "rating": { "type": ["integer", "null"], "minimum": 1, "maximum": 5 },
            "suggestion": { "type": ["string", "null"] }
        },
        "required": ["rating", "suggestion"],
        "additionalProperties": false
    })
}

/// Parse the model's reply. Accepts a bare JSON object, one wrapped in a
/// markdown code fence, or a literal `null`.
pub fn parse_feedback(text: &str) -> ExtractionOutcome {
    let json = strip_code_fence(text.trim());
    if json == "null" {
        return Ok(None);
    }

    let raw: RawFeedback =
        serde_json::from_str(json).map_err(|e| ExtractionFailure::Unparsable(e.to_string()))?;

    let Some(rating) = raw.rating else {
        return Ok(None);
    };
    if !(1..=5).contains(&rating) {
        return Err(ExtractionFailure::RatingOutOfRange(rating));
    }

    let suggestion = raw
        .suggestion
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(Some(RatedFeedback {
        rating: rating as u8,
        suggestion,
    }))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop a language tag such as `json` or `JSON` on the opening line
    let rest = match rest.split_once('\n') {
        Some((tag, body)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => body,
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    rest.trim().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::MockLanguageModel;
    use crate::error::Error;

    #[test]
    fn test_parse_plain_json() {
        let feedback = parse_feedback(r#"{"rating": 2, "suggestion": "Make it shorter"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(feedback, RatedFeedback::new(2, Some("Make it shorter")));
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"rating\": 5, \"suggestion\": null}\n```";
        assert_eq!(parse_feedback(text).unwrap(), Some(RatedFeedback::new(5, None)));
    }

    #[test]
    fn test_fence_tag_is_case_insensitive() {
        let upper = "```JSON\n{\"rating\": 3, \"suggestion\": \"more code\"}\n```";
        assert_eq!(parse_feedback(upper).unwrap(), Some(RatedFeedback::new(3, Some("more code"))));

        let bare = "```\n{\"rating\": 4}\n```";
        assert_eq!(parse_feedback(bare).unwrap(), Some(RatedFeedback::new(4, None)));

        let inline = "```Json {\"rating\": 1}```";
        assert_eq!(parse_feedback(inline).unwrap(), Some(RatedFeedback::new(1, None)));
    }

    #[test]
    fn test_no_rating_is_not_an_error() {
        assert_eq!(parse_feedback("null").unwrap(), None);
        assert_eq!(parse_feedback(r#"{"rating": null, "suggestion": "x"}"#).unwrap(), None);
        assert_eq!(parse_feedback("{}").unwrap(), None);
    }

    #[test]
    fn test_bad_output_is_an_error() {
        assert!(matches!(
            parse_feedback("The user seems happy"),
            Err(ExtractionFailure::Unparsable(_))
        ));
        assert!(matches!(
            parse_feedback(r#"{"rating": 7}"#),
            Err(ExtractionFailure::RatingOutOfRange(7))
        ));
    }

    #[test]
    fn test_blank_suggestion_is_dropped() {
        let feedback = parse_feedback(r#"{"rating": 3, "suggestion": "  "}"#).unwrap().unwrap();
        assert_eq!(feedback.suggestion, None);
    }

    #[tokio::test]
    async fn test_extract_sends_previous_answer_and_schema() {
        let mut model = MockLanguageModel::new();
        model
            .expect_complete()
            .withf(|req| {
                req.messages.len() == 3
                    && req.messages[1] == ChatMessage::assistant("Recursion is...")
                    && req.messages[2] == ChatMessage::user("Too long, be concise")
                    && req.response_format.is_some()
            })
            .times(1)
            .returning(|_| Ok(r#"{"rating": 2, "suggestion": "be concise"}"#.to_string()));

        let extractor = RatingExtractor::new(Arc::new(model));
        let outcome = extractor
            .extract(Some("Recursion is..."), "Too long, be concise")
            .await;
        assert_eq!(outcome.unwrap(), Some(RatedFeedback::new(2, Some("be concise"))));
    }

    #[tokio::test]
    async fn test_model_failure_becomes_extraction_failure() {
        let mut model = MockLanguageModel::new();
        model
            .expect_complete()
            .returning(|_| Err(Error::model("quota exceeded")));

        let extractor = RatingExtractor::new(Arc::new(model));
        let outcome = extractor.extract(None, "thanks").await;
        assert!(matches!(outcome, Err(ExtractionFailure::Model(_))));
    }
}

//! Language-model boundary and an OpenAI-compatible chat client
//!
//! Everything above this module treats the model as `complete(request) ->
//! text`. The HTTP client speaks the chat-completions dialect shared by
//! OpenAI, OpenRouter and Azure OpenAI deployments.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::Message;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_AZURE_API_VERSION: &str = "2024-08-01-preview";

/// Chat message in wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

/// One completion call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Structured-output request, passed through as `response_format`
    pub response_format: Option<serde_json::Value>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Ask for a JSON object matching `schema`
    pub fn json_schema(mut self, name: &str, schema: serde_json::Value) -> Self {
        self.response_format = Some(serde_json::json!({
            "type": "json_schema",
            "json_schema": { "name": name, "schema": schema },
        }));
        self
    }
}

/// A completion endpoint: messages in, text out. Implementations may fail
/// or hang; callers own timeouts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// How the API key is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `api-key: <key>` (Azure OpenAI)
    ApiKeyHeader,
}

/// Configuration for an LLM API provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Full chat-completions URL
    pub endpoint: String,
    pub api_key: String,
    /// Sent as `model`; ignored by Azure deployments
    pub model: String,
    pub auth: AuthStyle,
    /// Extra headers to include in requests (e.g., X-Title, HTTP-Referer)
    pub extra_headers: Vec<(String, String)>,
}

impl ProviderConfig {
    pub fn openai(api_key: String, model: impl Into<String>) -> Self {
        Self::openai_compatible(OPENAI_BASE_URL, api_key, model)
    }

    /// Any server exposing `{base_url}/chat/completions`
    pub fn openai_compatible(base_url: &str, api_key: String, model: impl Into<String>) -> Self {
        Self {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.into(),
            auth: AuthStyle::Bearer,
            extra_headers: Vec::new(),
        }
    }

    pub fn openrouter(api_key: String, model: impl Into<String>) -> Self {
        let mut config = Self::openai_compatible(OPENROUTER_BASE_URL, api_key, model);
        config.extra_headers = vec![("X-Title".to_string(), "Feedback Agent".to_string())];
        config
    }

    pub fn azure(endpoint: &str, deployment: &str, api_version: Option<&str>, api_key: String) -> Self {
        Self {
            endpoint: format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                api_version.unwrap_or(DEFAULT_AZURE_API_VERSION)
            ),
            api_key,
            model: deployment.to_string(),
            auth: AuthStyle::ApiKeyHeader,
            extra_headers: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a serde_json::Value>,
}

/// HTTP chat-completions client
#[derive(Clone)]
pub struct ChatClient {
    client: Arc<Client>,
    provider: ProviderConfig,
}

impl ChatClient {
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            client: Arc::new(Client::new()),
            provider,
        }
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.provider.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.response_format.as_ref(),
        };

        let mut req_builder = self.client.post(&self.provider.endpoint);
        req_builder = match self.provider.auth {
            AuthStyle::Bearer => req_builder.bearer_auth(&self.provider.api_key),
            AuthStyle::ApiKeyHeader => req_builder.header("api-key", &self.provider.api_key),
        };
        for (key, value) in &self.provider.extra_headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        debug!("Sending {} messages to {}", request.messages.len(), self.provider.model);
        let response = req_builder.json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::model(format!("LLM API error ({}): {}", status, body)));
        }

        let body = response.text().await?;
        extract_content(&body)
    }
}

/// Pull the first choice's text out of a chat-completions body. Content may
/// be a plain string or an array of typed parts.
pub fn extract_content(body: &str) -> Result<String> {
    let raw: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::model(format!("failed to parse JSON response: {}", e)))?;

    let content = raw
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"));

    match content {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Array(parts)) => Ok(parts
            .iter()
            .filter(|part| part.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("")),
        _ => Err(Error::model("response contained no message content")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_string_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hello"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "Hello");
    }

    #[test]
    fn test_extract_content_parts() {
        let body = r#"{"choices":[{"message":{"content":[
            {"type":"text","text":"Hel"},{"type":"image_url","image_url":{}},{"type":"text","text":"lo"}
        ]}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "Hello");
    }

    #[test]
    fn test_malformed_bodies_are_model_errors() {
        assert!(extract_content("not json").unwrap_err().is_model());
        assert!(extract_content(r#"{"choices":[]}"#).unwrap_err().is_model());
        assert!(extract_content(r#"{"error":{"message":"quota"}}"#).unwrap_err().is_model());
    }

    #[test]
    fn test_azure_endpoint() {
        let config = ProviderConfig::azure("https://acme.openai.azure.com/", "gpt-4o", None, "k".into());
        assert_eq!(
            config.endpoint,
            "https://acme.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-08-01-preview"
        );
        assert_eq!(config.auth, AuthStyle::ApiKeyHeader);
    }

    #[test]
    fn test_request_serialization_skips_unset_options() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            max_tokens: Some(64),
            temperature: None,
            response_format: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_tokens"], 64);
        assert!(json.get("temperature").is_none());
        assert!(json.get("response_format").is_none());
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[test]
    fn test_json_schema_request() {
        let request = CompletionRequest::new(vec![]).json_schema("user_feedback", serde_json::json!({"type": "object"}));
        let format = request.response_format.unwrap();
        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["json_schema"]["name"], "user_feedback");
    }
}

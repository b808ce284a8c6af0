//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to send a role-tagged prompt to a chat-completions
//! style endpoint and get text back. Prompts may carry image parts, and a
//! request may ask for structured output against a JSON Schema.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::message::Role;

/// One part of a prompt entry's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String },
}

/// A single role-tagged prompt entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl PromptMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }

    /// Concatenated text parts (image parts skipped).
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn image_urls(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|part| match part {
            ContentPart::ImageUrl { url } => Some(url.as_str()),
            ContentPart::Text { .. } => None,
        })
    }
}

/// Structured-output constraint for a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Schema name reported to the backend
    pub name: String,

    /// The JSON Schema the output must conform to
    pub schema: Value,

    /// Ask the backend to enforce the schema strictly
    #[serde(default)]
    pub strict: bool,
}

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// The prompt entries
    pub messages: Vec<PromptMessage>,

    /// Temperature (0.0 = deterministic, higher = more creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Structured-output schema, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

fn default_temperature() -> f32 {
    0.9
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<PromptMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            response_format: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text, normalized across response shapes
    pub content: String,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// The untouched response body
    #[serde(default)]
    pub raw: Value,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Extract the generated text from a completion body.
///
/// Handles `choices[0].message.content` as a plain string or as an array
/// of content parts, and the `output[].content[].text` shape. Returns an
/// empty string when no text is present.
pub fn normalize_text(body: &Value) -> String {
    if let Some(content) = body.pointer("/choices/0/message/content") {
        match content {
            Value::String(text) => return text.clone(),
            Value::Array(parts) => return join_text_parts(parts),
            _ => {}
        }
    }

    if let Some(output) = body.get("output").and_then(Value::as_array) {
        return output
            .iter()
            .filter_map(|item| item.get("content").and_then(Value::as_array))
            .map(|parts| join_text_parts(parts))
            .collect::<String>();
    }

    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }

    String::new()
}

fn join_text_parts(parts: &[Value]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            Value::String(text) => Some(text.as_str()),
            other => other.get("text").and_then(Value::as_str),
        })
        .collect()
}

/// The core Provider trait.
///
/// The session and the synthesizer call `complete()` without knowing which
/// backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest::new("gpt-4o-mini", vec![PromptMessage::user("hi")]);
        assert!((req.temperature - 0.9).abs() < f32::EPSILON);
        assert!(req.response_format.is_none());
    }

    #[test]
    fn normalizes_string_content() {
        let body = json!({"choices": [{"message": {"content": "hello"}}]});
        assert_eq!(normalize_text(&body), "hello");
    }

    #[test]
    fn normalizes_part_arrays() {
        let body = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "{\"a\":"},
            {"type": "text", "text": "1}"}
        ]}}]});
        assert_eq!(normalize_text(&body), "{\"a\":1}");
    }

    #[test]
    fn normalizes_output_items() {
        let body = json!({"output": [
            {"type": "reasoning", "content": []},
            {"type": "message", "content": [{"type": "output_text", "text": "done"}]}
        ]});
        assert_eq!(normalize_text(&body), "done");
    }

    #[test]
    fn missing_text_is_empty() {
        assert_eq!(normalize_text(&json!({"choices": []})), "");
        assert_eq!(normalize_text(&json!(null)), "");
    }

    #[test]
    fn prompt_message_text_skips_images() {
        let msg = PromptMessage {
            role: Role::User,
            content: vec![
                ContentPart::Text { text: "look".into() },
                ContentPart::ImageUrl { url: "https://x/y.png".into() },
            ],
        };
        assert_eq!(msg.text_content(), "look");
        assert_eq!(msg.image_urls().collect::<Vec<_>>(), vec!["https://x/y.png"]);
    }
}

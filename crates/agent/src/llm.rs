//! Chat model client
//!
//! [`ChatModel`] is the seam the agent loop talks to. [`AnthropicModel`]
//! implements it against the Messages API with tool use.

use crate::tools::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Errors from the model transport
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("rate limited after {0} attempts")]
    RateLimited(u32),

    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    /// Block types this client does not act on
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

/// A single completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl ChatResponse {
    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// `(id, name, input)` of every tool use block, in order
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

/// A model that can answer a chat request, possibly with tool calls
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError>;
}

/// Connection settings for the Messages API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            request_timeout_secs: 300,
        }
    }
}

/// Messages API client
pub struct AnthropicModel {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for AnthropicModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicModel")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl AnthropicModel {
    pub fn new(settings: &ModelSettings, api_key: impl Into<String>) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/v1/messages", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            api_key: api_key.into(),
        })
    }

    /// Build a client reading the key from `settings.api_key_env`
    pub fn from_env(settings: &ModelSettings) -> Result<Self, ModelError> {
        let key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ModelError::MissingApiKey(settings.api_key_env.clone()))?;
        Self::new(settings, key)
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": request.messages,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

#[async_trait]
impl ChatModel for AnthropicModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError> {
        let body = self.request_body(request);

        for attempt in 1..=MAX_RATE_LIMIT_RETRIES {
            let resp = self
                .http
                .post(&self.endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await?;

            let status = resp.status();
            if status.as_u16() == 429 || status.as_u16() == 529 {
                let wait = Duration::from_secs(u64::from(attempt) * 5);
                warn!("Model API overloaded ({}), retrying in {:?}", status, wait);
                tokio::time::sleep(wait).await;
                continue;
            }

            let text = resp.text().await?;
            if !status.is_success() {
                let message = serde_json::from_str::<Value>(&text)
                    .ok()
                    .and_then(|v| {
                        v.pointer("/error/message")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .unwrap_or(text);
                return Err(ModelError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let response: ChatResponse = serde_json::from_str(&text)?;
            debug!(
                stop_reason = ?response.stop_reason,
                blocks = response.content.len(),
                "Model response received"
            );
            return Ok(response);
        }

        Err(ModelError::RateLimited(MAX_RATE_LIMIT_RETRIES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_decoding_and_helpers() {
        let response: ChatResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "Opening the page. "},
                {"type": "tool_use", "id": "tu_1", "name": "browser_navigate", "input": {"url": "https://example.com"}},
                {"type": "text", "text": "Done."}
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();

        assert_eq!(response.content[0], ContentBlock::Other);
        assert_eq!(response.text(), "Opening the page. Done.");
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].0, "tu_1");
        assert_eq!(uses[0].1, "browser_navigate");
        assert_eq!(uses[0].2["url"], "https://example.com");
    }

    #[test]
    fn test_tool_result_serialization() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "tu_1".to_string(),
            content: "failed".to_string(),
            is_error: true,
        };
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"type": "tool_result", "tool_use_id": "tu_1", "content": "failed", "is_error": true})
        );
    }

    #[test]
    fn test_request_body_uses_api_tool_shape() {
        let model = AnthropicModel::new(&ModelSettings::default(), "key").unwrap();
        let request = ChatRequest {
            system: "system".to_string(),
            messages: vec![Message::user_text("hi")],
            tools: vec![ToolDefinition::new("browser_click", "Click", json!({"type": "object"}))],
            max_tokens: 1024,
        };

        let body = model.request_body(&request);
        assert_eq!(body["tools"][0]["input_schema"], json!({"type": "object"}));
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["type"], "text");
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn test_missing_api_key() {
        let settings = ModelSettings {
            api_key_env: "STEPWRIGHT_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            AnthropicModel::from_env(&settings),
            Err(ModelError::MissingApiKey(_))
        ));
    }
}

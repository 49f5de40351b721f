//! Tool-using agent loop

use crate::llm::{ChatModel, ChatRequest, ContentBlock, Message, ModelError, Role};
use crate::tools::{ToolExecutionError, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// What the loop does when a tool call fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailurePolicy {
    /// Feed every failure back to the model as an error result
    #[default]
    ReportToModel,
    /// Feed reported failures back, abort on invocation failures
    AbortOnTransport,
    /// Abort on any tool failure
    Abort,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model request failed: {0}")]
    Model(#[from] ModelError),

    #[error(transparent)]
    Tool(#[from] ToolExecutionError),

    #[error("agent did not finish within {0} turns")]
    TurnLimit(u32),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("model reply was cut off at the {0} token limit")]
    Truncated(u32),
}

/// Stop reason of a reply that hit the output token limit
const MAX_TOKENS_STOP: &str = "max_tokens";

/// Loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_tokens: u32,
    pub max_turns: u32,
    pub tool_failure_policy: ToolFailurePolicy,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            max_turns: 50,
            tool_failure_policy: ToolFailurePolicy::default(),
        }
    }
}

/// Drives a model with access to a tool registry until it answers in text
pub struct ToolAgent {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    settings: AgentSettings,
}

impl ToolAgent {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>, settings: AgentSettings) -> Self {
        Self {
            model,
            tools,
            settings,
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run the loop and return the final text answer.
    ///
    /// Each turn sends the conversation to the model. Tool uses in the reply
    /// are executed in order and their results appended; a reply without
    /// tool uses ends the loop.
    pub async fn run(&self, system: &str, user: &str) -> Result<String, AgentError> {
        let mut request = ChatRequest {
            system: system.to_string(),
            messages: vec![Message::user_text(user)],
            tools: self.tools.definitions(),
            max_tokens: self.settings.max_tokens,
        };

        for turn in 1..=self.settings.max_turns {
            let response = self.model.complete(&request).await?;
            debug!(turn, stop_reason = ?response.stop_reason, "Agent turn");

            // A cut-off reply holds a partial script or a partial tool input
            if response.stop_reason.as_deref() == Some(MAX_TOKENS_STOP) {
                warn!(turn, max_tokens = self.settings.max_tokens, "Model reply truncated");
                return Err(AgentError::Truncated(self.settings.max_tokens));
            }

            let tool_uses: Vec<(String, String, Value)> = response
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if tool_uses.is_empty() {
                let text = response.text();
                if text.trim().is_empty() {
                    return Err(AgentError::EmptyResponse);
                }
                info!(turns = turn, "Agent finished");
                return Ok(text);
            }

            request.messages.push(Message {
                role: Role::Assistant,
                content: response
                    .content
                    .into_iter()
                    .filter(|b| !matches!(b, ContentBlock::Other))
                    .collect(),
            });

            let mut results = Vec::with_capacity(tool_uses.len());
            for (id, name, input) in tool_uses {
                results.push(self.dispatch(id, &name, &input).await?);
            }

            request.messages.push(Message {
                role: Role::User,
                content: results,
            });
        }

        Err(AgentError::TurnLimit(self.settings.max_turns))
    }

    async fn dispatch(
        &self,
        tool_use_id: String,
        name: &str,
        input: &Value,
    ) -> Result<ContentBlock, AgentError> {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "Model requested an unknown tool");
            return Ok(ContentBlock::ToolResult {
                tool_use_id,
                content: format!("Unknown tool: {}", name),
                is_error: true,
            });
        };

        match tool.call(input).await {
            Ok(content) => Ok(ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error: false,
            }),
            Err(e) => {
                let abort = match self.settings.tool_failure_policy {
                    ToolFailurePolicy::ReportToModel => false,
                    ToolFailurePolicy::AbortOnTransport => !e.is_reported(),
                    ToolFailurePolicy::Abort => true,
                };
                if abort {
                    return Err(AgentError::Tool(e));
                }

                warn!(tool = name, reported = e.is_reported(), "Tool failure returned to model");
                Ok(ContentBlock::ToolResult {
                    tool_use_id,
                    content: e.to_string(),
                    is_error: true,
                })
            }
        }
    }
}

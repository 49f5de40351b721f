//! Tool-invocation bridge
//!
//! Every tool the agent can call is a [`BridgedTool`]: a definition plus a
//! handle to the [`ToolProvider`] that owns it. A call distinguishes two
//! failure kinds that share one error type:
//!
//! - the tool ran and reported failure (`isError` on the response)
//! - the invocation itself failed (transport, timeout, malformed response)
//!
//! [`ToolRegistry::assemble`] builds the tool set handed to the agent and
//! refuses to produce one with ambiguous names.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Tool as advertised by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", alias = "input_schema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Structured response of a tool call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallToolResponse {
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

/// Failures raised by a provider's transport
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to spawn tool server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation} on tool server '{server}' timed out after {secs}s")]
    Timeout {
        server: String,
        operation: String,
        secs: u64,
    },

    #[error("tool server '{0}' closed the connection")]
    Closed(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("remote error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// A client that exposes callable tools
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Provider name used in logs and errors
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ProviderError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResponse, ProviderError>;
}

/// How a tool call failed
#[derive(Debug, Clone, PartialEq)]
pub enum ToolFailureKind {
    /// The tool executed and flagged its own result as an error
    Reported { content: String },
    /// The call never produced a usable response
    Invocation,
}

/// Uniform failure surface for tool calls
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ToolExecutionError {
    definition: ToolDefinition,
    kind: ToolFailureKind,
    message: String,
    #[source]
    source: Option<ProviderError>,
}

impl ToolExecutionError {
    fn reported(definition: &ToolDefinition, content: String) -> Self {
        Self {
            message: format!("Error calling tool '{}': {}", definition.name, content),
            definition: definition.clone(),
            kind: ToolFailureKind::Reported { content },
            source: None,
        }
    }

    fn invocation(definition: &ToolDefinition, message: String, source: Option<ProviderError>) -> Self {
        Self {
            message: format!("Tool '{}' invocation failed: {}", definition.name, message),
            definition: definition.clone(),
            kind: ToolFailureKind::Invocation,
            source,
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.definition.name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.definition.input_schema
    }

    pub fn kind(&self) -> &ToolFailureKind {
        &self.kind
    }

    /// True when the tool itself reported the failure
    pub fn is_reported(&self) -> bool {
        matches!(self.kind, ToolFailureKind::Reported { .. })
    }
}

/// One callable tool bound to its owning provider
#[derive(Clone)]
pub struct BridgedTool {
    definition: ToolDefinition,
    provider: Arc<dyn ToolProvider>,
}

impl std::fmt::Debug for BridgedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgedTool")
            .field("name", &self.definition.name)
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl BridgedTool {
    pub fn new(definition: ToolDefinition, provider: Arc<dyn ToolProvider>) -> Self {
        Self {
            definition,
            provider,
        }
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Invoke the tool. On success the response content is returned as JSON text.
    pub async fn call(&self, arguments: &Value) -> Result<String, ToolExecutionError> {
        let args = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(ToolExecutionError::invocation(
                    &self.definition,
                    format!("arguments must be a JSON object, got {}", other),
                    None,
                ))
            }
        };

        debug!(tool = %self.definition.name, provider = %self.provider.name(), "Calling tool");

        let response = match self.provider.call_tool(&self.definition.name, args).await {
            Ok(response) => response,
            Err(e) => {
                error!(tool = %self.definition.name, "Tool invocation failed: {}", e);
                return Err(ToolExecutionError::invocation(
                    &self.definition,
                    e.to_string(),
                    Some(e),
                ));
            }
        };

        let content = serde_json::to_string(&response.content).map_err(|e| {
            ToolExecutionError::invocation(&self.definition, e.to_string(), Some(e.into()))
        })?;

        if response.is_error {
            warn!(tool = %self.definition.name, "Tool reported an error: {}", content);
            return Err(ToolExecutionError::reported(&self.definition, content));
        }

        Ok(content)
    }
}

/// Allow/block lists applied to a provider's tools before registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolFilter {
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(default)]
    pub blocked: Vec<String>,
}

impl ToolFilter {
    pub fn permits(&self, name: &str) -> bool {
        if !self.allowed.is_empty() && !self.allowed.iter().any(|a| a == name) {
            return false;
        }
        !self.blocked.iter().any(|b| b == name)
    }
}

/// Errors while assembling the tool set
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Multiple tools with the same name ({})", .0.join(", "))]
    DuplicateToolNames(Vec<String>),

    #[error("failed to list tools from '{provider}': {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },
}

/// The unambiguous tool set handed to the agent
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<BridgedTool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// List tools from every provider, apply each provider's filter and
    /// register the result. Fails if any name appears more than once.
    pub async fn assemble(
        sources: Vec<(Arc<dyn ToolProvider>, ToolFilter)>,
    ) -> Result<Self, RegistryError> {
        let mut tools = Vec::new();

        for (provider, filter) in sources {
            let listed = provider
                .list_tools()
                .await
                .map_err(|source| RegistryError::Provider {
                    provider: provider.name().to_string(),
                    source,
                })?;

            let total = listed.len();
            let kept: Vec<_> = listed
                .into_iter()
                .filter(|t| filter.permits(&t.name))
                .collect();

            info!(
                provider = %provider.name(),
                "Registered {} of {} tools",
                kept.len(),
                total
            );

            tools.extend(
                kept.into_iter()
                    .map(|def| BridgedTool::new(def, Arc::clone(&provider))),
            );
        }

        Self::from_tools(tools)
    }

    /// Build a registry from already bound tools
    pub fn from_tools(tools: Vec<BridgedTool>) -> Result<Self, RegistryError> {
        let mut by_name = HashMap::with_capacity(tools.len());
        let mut duplicates = BTreeSet::new();

        for (idx, tool) in tools.iter().enumerate() {
            if by_name.insert(tool.name().to_string(), idx).is_some() {
                duplicates.insert(tool.name().to_string());
            }
        }

        if !duplicates.is_empty() {
            let names: Vec<String> = duplicates.into_iter().collect();
            error!("Duplicate tool names: {:?}", names);
            return Err(RegistryError::DuplicateToolNames(names));
        }

        Ok(Self { tools, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&BridgedTool> {
        self.by_name.get(name).map(|&idx| &self.tools[idx])
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

//! Stepwright Agent
//!
//! Generates Playwright scripts from tabular test steps with an LLM that
//! drives a browser through MCP tools.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ GenerationCoordinator│  state machine + prompt
//! └──────────┬───────────┘
//!            │
//! ┌──────────▼───────────┐     ┌──────────────┐
//! │      ToolAgent       │────►│  ChatModel   │
//! └──────────┬───────────┘     └──────────────┘
//!            │
//! ┌──────────▼───────────┐     ┌──────────────┐
//! │     ToolRegistry     │────►│ ToolProvider │  (MCP over stdio)
//! └──────────────────────┘     └──────────────┘
//! ```

pub mod agent;
pub mod generator;
pub mod llm;
pub mod mcp;
pub mod prompt;
pub mod tools;

pub use agent::{AgentError, AgentSettings, ToolAgent, ToolFailurePolicy};
pub use generator::{Generated, GenerationCoordinator, GenerationError, NO_STEPS_PROVIDED};
pub use llm::{AnthropicModel, ChatModel, ChatRequest, ChatResponse, ContentBlock, ModelError, ModelSettings};
pub use mcp::{McpServerConfig, McpStdioProvider};
pub use tools::{
    BridgedTool, CallToolResponse, ProviderError, RegistryError, ToolDefinition,
    ToolExecutionError, ToolFailureKind, ToolFilter, ToolProvider, ToolRegistry,
};

//! MCP tool provider over a child process's stdio
//!
//! Speaks newline-delimited JSON-RPC 2.0 with the server: `initialize`,
//! `notifications/initialized`, `tools/list` and `tools/call`. Requests are
//! serialized over one channel; responses are matched by id, and anything
//! else the server writes (notifications, stale responses) is skipped.

use crate::tools::{CallToolResponse, ProviderError, ToolDefinition, ToolFilter, ToolProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Configuration of one stdio MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub blocked_tools: Vec<String>,
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
    #[serde(default = "default_tool_call_timeout_secs")]
    pub tool_call_timeout_secs: u64,
}

fn default_init_timeout_secs() -> u64 {
    30
}

fn default_tool_call_timeout_secs() -> u64 {
    120
}

impl McpServerConfig {
    /// The Playwright MCP server launched through npx
    pub fn playwright() -> Self {
        Self {
            name: "playwright".to_string(),
            command: "npx".to_string(),
            args: vec!["@playwright/mcp@latest".to_string()],
            env: HashMap::new(),
            allowed_tools: Vec::new(),
            blocked_tools: Vec::new(),
            init_timeout_secs: default_init_timeout_secs(),
            tool_call_timeout_secs: default_tool_call_timeout_secs(),
        }
    }

    pub fn filter(&self) -> ToolFilter {
        ToolFilter {
            allowed: self.allowed_tools.clone(),
            blocked: self.blocked_tools.clone(),
        }
    }
}

struct Channel {
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    /// Bytes of the line being read. Survives a timed out request so the
    /// next one resumes mid-line instead of seeing a torn message.
    pending: Vec<u8>,
}

/// Tool provider backed by an MCP server child process
pub struct McpStdioProvider {
    config: McpServerConfig,
    channel: Mutex<Channel>,
    child: Mutex<Child>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for McpStdioProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpStdioProvider")
            .field("name", &self.config.name)
            .field("command", &self.config.command)
            .finish_non_exhaustive()
    }
}

impl McpStdioProvider {
    /// Spawn the server and complete the initialize handshake
    pub async fn connect(config: McpServerConfig) -> Result<Self, ProviderError> {
        let provider = Self::spawn(config)?;

        let timeout = Duration::from_secs(provider.config.init_timeout_secs);
        let init = provider
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "stepwright",
                        "version": stepwright_common::VERSION,
                    }
                }),
                timeout,
            )
            .await?;

        let server_name = init
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(
            mcp_server = %provider.config.name,
            "Connected to MCP server {} (protocol {})",
            server_name,
            init.get("protocolVersion")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("?")
        );

        provider
            .notify("notifications/initialized", json!({}))
            .await?;

        Ok(provider)
    }

    fn spawn(config: McpServerConfig) -> Result<Self, ProviderError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ProviderError::Spawn {
            server: config.name.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::Protocol("failed to capture server stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::Protocol("failed to capture server stdout".to_string()))?;

        // Keep the server from blocking on a full stderr pipe
        if let Some(stderr) = child.stderr.take() {
            let name = config.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(mcp_server = %name, "[stderr] {}", line);
                }
            });
        }

        Ok(Self {
            config,
            channel: Mutex::new(Channel {
                stdin: BufWriter::new(stdin),
                stdout: BufReader::new(stdout),
                pending: Vec::new(),
            }),
            child: Mutex::new(child),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    /// Stop the server process
    pub async fn shutdown(&self) {
        let mut child = self.child.lock().await;
        if let Err(e) = child.start_kill() {
            debug!(mcp_server = %self.config.name, "start_kill failed: {}", e);
        }
        if tokio::time::timeout(Duration::from_secs(3), child.wait())
            .await
            .is_err()
        {
            warn!(mcp_server = %self.config.name, "Server did not exit after kill");
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ProviderError> {
        let message = json!({ "jsonrpc": "2.0", "method": method, "params": params });
        let mut channel = self.channel.lock().await;
        write_line(&mut channel.stdin, &message).await
    }

    async fn request(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        let exchange = async {
            let mut channel = self.channel.lock().await;
            write_line(&mut channel.stdin, &message).await?;

            loop {
                let Channel {
                    stdout, pending, ..
                } = &mut *channel;
                // read_until keeps partial input in `pending` when cancelled
                let n = stdout.read_until(b'\n', pending).await?;
                let eof = n == 0 || pending.last() != Some(&b'\n');

                let line = String::from_utf8_lossy(pending).trim().to_string();
                pending.clear();
                if let Some(outcome) = match_response(&line, id) {
                    return outcome;
                }
                if eof {
                    return Err(ProviderError::Closed(self.config.name.clone()));
                }
            }
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ProviderError::Timeout {
                server: self.config.name.clone(),
                operation: method.to_string(),
                secs: timeout.as_secs(),
            })?
    }
}

async fn write_line(stdin: &mut BufWriter<ChildStdin>, message: &Value) -> Result<(), ProviderError> {
    let bytes = serde_json::to_vec(message)?;
    stdin.write_all(&bytes).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await?;
    Ok(())
}

/// Decode one line read from the server.
///
/// Returns `None` for lines that are not the response to `id` (blank or
/// non-JSON lines, notifications, server requests, responses to other ids).
fn match_response(line: &str, id: u64) -> Option<Result<Value, ProviderError>> {
    if line.is_empty() {
        return None;
    }

    let message: Value = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            debug!("Skipping non-JSON server output ({}): {}", e, line);
            return None;
        }
    };
    if message.get("method").is_some() || message.get("id").and_then(Value::as_u64) != Some(id) {
        debug!("Skipping unrelated server message");
        return None;
    }

    if let Some(error) = message.get("error") {
        return Some(Err(ProviderError::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        }));
    }

    match message.get("result") {
        Some(result) => Some(Ok(result.clone())),
        None => Some(Err(ProviderError::Protocol(format!(
            "response {} has neither result nor error",
            id
        )))),
    }
}

#[async_trait]
impl ToolProvider for McpStdioProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ProviderError> {
        let timeout = Duration::from_secs(self.config.init_timeout_secs);
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let result = self.request("tools/list", params, timeout).await?;

            let page: Vec<ToolDefinition> = match result.get("tools") {
                Some(listed) => serde_json::from_value(listed.clone())?,
                None => Vec::new(),
            };
            tools.extend(page);

            cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }

        debug!(mcp_server = %self.config.name, "Listed {} tools", tools.len());
        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResponse, ProviderError> {
        let timeout = Duration::from_secs(self.config.tool_call_timeout_secs);
        let result = self
            .request(
                "tools/call",
                json!({ "name": name, "arguments": arguments }),
                timeout,
            )
            .await?;

        Ok(serde_json::from_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_response_result() {
        let line = r#"{"jsonrpc":"2.0","id":4,"result":{"tools":[]}}"#;
        let value = match_response(line, 4).unwrap().unwrap();
        assert_eq!(value, json!({"tools": []}));
    }

    #[test]
    fn test_match_response_skips_unrelated_messages() {
        assert!(match_response("", 1).is_none());
        assert!(match_response(r#"{"jsonrpc":"2.0","method":"notifications/message","params":{}}"#, 1)
            .is_none());
        assert!(match_response(r#"{"jsonrpc":"2.0","id":2,"result":{}}"#, 1).is_none());
    }

    #[test]
    fn test_match_response_rpc_error() {
        let line = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#;
        let err = match_response(line, 1).unwrap().unwrap_err();
        assert!(matches!(err, ProviderError::Rpc { code: -32601, .. }));
    }

    #[test]
    fn test_match_response_skips_non_json_output() {
        assert!(match_response("npm warn exec The following package was not found", 1).is_none());
        assert!(match_response(r#"{"jsonrpc":"2.0","id""#, 1).is_none());
    }

    #[test]
    fn test_config_defaults_from_toml_shape() {
        let config: McpServerConfig = serde_json::from_value(json!({
            "name": "browser",
            "command": "npx",
            "blocked_tools": ["browser_install"]
        }))
        .unwrap();
        assert!(config.args.is_empty());
        assert_eq!(config.init_timeout_secs, 30);
        assert_eq!(config.tool_call_timeout_secs, 120);
        assert!(!config.filter().permits("browser_install"));
        assert!(config.filter().permits("browser_click"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let mut config = McpServerConfig::playwright();
        config.command = "/nonexistent/stepwright-mcp-server".to_string();
        let err = McpStdioProvider::connect(config).await.unwrap_err();
        assert!(matches!(err, ProviderError::Spawn { .. }));
    }
}

//! MCP stdio provider against a scripted shell server

#![cfg(unix)]

use serde_json::{json, Map};
use std::sync::Arc;
use stepwright_agent::{
    BridgedTool, McpServerConfig, McpStdioProvider, ProviderError, ToolFilter, ToolProvider,
    ToolRegistry,
};

/// Answers requests 1..=3 in order and ignores everything else
const FAKE_SERVER: &str = r#"
read init
echo '{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}'
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake","version":"0.0.1"}}}'
read initialized
read list
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"browser_click","description":"Click","inputSchema":{"type":"object"}},{"name":"browser_install","inputSchema":{"type":"object"}}]}}'
read call
echo "fake server log line" >&2
echo '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"Element not found"}],"isError":true}}'
read rest
"#;

fn config(script: &str, tool_call_timeout_secs: u64) -> McpServerConfig {
    McpServerConfig {
        name: "fake".to_string(),
        command: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        env: Default::default(),
        allowed_tools: vec![],
        blocked_tools: vec!["browser_install".to_string()],
        init_timeout_secs: 5,
        tool_call_timeout_secs,
    }
}

#[tokio::test]
async fn test_handshake_list_and_reported_error() {
    let cfg = config(FAKE_SERVER, 5);
    let filter: ToolFilter = cfg.filter();
    let provider: Arc<dyn ToolProvider> = Arc::new(McpStdioProvider::connect(cfg).await.unwrap());

    let registry = ToolRegistry::assemble(vec![(Arc::clone(&provider), filter)])
        .await
        .unwrap();
    assert_eq!(registry.len(), 1);

    let tool: &BridgedTool = registry.get("browser_click").unwrap();
    let err = tool.call(&json!({"ref": "e3"})).await.unwrap_err();
    assert!(err.is_reported());
    assert!(err.to_string().contains("Element not found"));
}

#[tokio::test]
async fn test_tool_call_timeout() {
    let script = r#"
read init
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}'
read initialized
read call
sleep 30
"#;
    let provider = McpStdioProvider::connect(config(script, 1)).await.unwrap();

    let err = provider
        .call_tool("browser_click", Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Timeout { secs: 1, .. }));

    provider.shutdown().await;
}

#[tokio::test]
async fn test_server_exit_is_closed_connection() {
    let script = r#"
read init
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}'
read initialized
"#;
    let provider = McpStdioProvider::connect(config(script, 5)).await.unwrap();
    let err = provider.list_tools().await.unwrap_err();
    assert!(matches!(err, ProviderError::Closed(_)) || matches!(err, ProviderError::Io(_)));
}

#[tokio::test]
async fn test_timeout_mid_line_does_not_break_next_call() {
    let script = r#"
read init
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}'
read initialized
read call
printf '%s' '{"jsonrpc":"2.0","id":2,'
sleep 2
echo '"result":{"content":[{"type":"text","text":"late"}]}}'
echo 'npm warn exec installing @playwright/mcp'
read call
echo '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"clicked"}]}}'
read rest
"#;
    let provider = McpStdioProvider::connect(config(script, 1)).await.unwrap();

    let err = provider
        .call_tool("browser_click", Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Timeout { .. }));

    // Let the server finish the interrupted line before the next request
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    let response = provider
        .call_tool("browser_click", Map::new())
        .await
        .unwrap();
    assert!(!response.is_error);
    assert_eq!(response.content, vec![json!({"type": "text", "text": "clicked"})]);

    provider.shutdown().await;
}

use super::*;
use crate::core::message::ToolOutput;
use crate::core::normalize::normalize;
use serde_json::json;

fn stdio_config(id: &str, command: &str, args: Vec<String>) -> McpServerConfig {
    McpServerConfig {
        id: id.to_string(),
        transport: Some("stdio".to_string()),
        command: Some(command.to_string()),
        args: Some(args),
        ..Default::default()
    }
}

/// A shell stand-in for an MCP server that answers one initialize, one
/// `tools/list` and one `tools/call`, in that order.
#[cfg(unix)]
fn scripted_server_config(id: &str) -> McpServerConfig {
    let script = r#"
read line
echo '{"jsonrpc":"2.0","id":0,"result":{"protocolVersion":"2025-11-25","capabilities":{"tools":{}},"serverInfo":{"name":"fake","version":"1.0.0"}}}'
read line
read line
echo '{"jsonrpc":"2.0","id":1,"result":{"tools":[{"name":"echo","description":"Echo input","inputSchema":{"type":"object"}},{"name":"rm","inputSchema":{"type":"object"}}]}}'
read line
echo '{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"{\"ok\":true}"}]}}'
read line
"#;
    stdio_config(id, "sh", vec!["-c".to_string(), script.to_string()])
}

/// Serves `tools/list` in two pages of `per_page` tools each.
#[cfg(unix)]
fn paginated_server_config(id: &str, per_page: usize) -> McpServerConfig {
    let page = |request_id: u64, first: usize, cursor: Option<&str>| {
        let tools: Vec<Value> = (first..first + per_page)
            .map(|i| json!({"name": format!("tool_{i}"), "inputSchema": {"type": "object"}}))
            .collect();
        let mut result = json!({ "tools": tools });
        if let Some(cursor) = cursor {
            result["nextCursor"] = json!(cursor);
        }
        json!({"jsonrpc": "2.0", "id": request_id, "result": result}).to_string()
    };
    let script = format!(
        r#"
read line
echo '{{"jsonrpc":"2.0","id":0,"result":{{"protocolVersion":"2025-11-25","capabilities":{{"tools":{{}}}},"serverInfo":{{"name":"paged","version":"1.0.0"}}}}}}'
read line
read line
echo '{first}'
read line
echo '{second}'
read line
"#,
        first = page(1, 0, Some("page-2")),
        second = page(2, per_page, None),
    );
    stdio_config(id, "sh", vec!["-c".to_string(), script])
}

#[test]
fn client_details_advertise_package_identity() {
    let details = client_details_for(&McpServerConfig::default());
    assert_eq!(details.client_info.name, "chat-mcp");
    assert_eq!(details.client_info.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(
        details.protocol_version,
        rust_mcp_schema::LATEST_PROTOCOL_VERSION
    );
}

#[test]
fn pagination_params_only_when_cursor_present() {
    assert!(paginated_params(None).is_none());
    let params = paginated_params(Some("next".to_string())).expect("params");
    assert_eq!(params.cursor.as_deref(), Some("next"));
}

#[tokio::test]
async fn connect_all_skips_disabled_servers() {
    let disabled = McpServerConfig {
        enabled: Some(false),
        ..stdio_config("off", "/nonexistent/server", Vec::new())
    };
    let connections = connect_all(&[disabled]).await.expect("nothing to connect");
    assert!(connections.is_empty());
}

#[tokio::test]
async fn connect_all_fails_on_first_enabled_failure() {
    let configs = vec![
        stdio_config("broken", "/nonexistent/chat-mcp-server", Vec::new()),
        stdio_config("also-broken", "/nonexistent/other-server", Vec::new()),
    ];
    let err = connect_all(&configs).await.err().expect("connect error");
    match err {
        McpError::Connect { server_id, .. } => assert_eq!(server_id, "broken"),
        other => panic!("unexpected error: {other}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn stdio_connection_lists_and_calls_tools() {
    let mut config = scripted_server_config("fake");
    config.disabled_tools = Some(vec!["rm".to_string()]);

    let connection = McpServerConnection::connect(&config)
        .await
        .expect("connect scripted server");
    assert_eq!(connection.server_details().server_info.name, "fake");

    let tools = connection.list_tools().await.expect("list tools");
    let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, ["echo"]);
    assert_eq!(tools[0].description.as_deref(), Some("Echo input"));

    let raw = connection
        .call_tool("echo", &json!({"value": 1}))
        .await
        .expect("call tool");
    assert_eq!(normalize(&raw), ToolOutput::Structured(json!({"ok": true})));

    connection.close().await;
}

#[cfg(unix)]
#[tokio::test]
async fn non_object_arguments_are_rejected_before_sending() {
    let connection = McpServerConnection::connect(&scripted_server_config("fake"))
        .await
        .expect("connect scripted server");
    let err = connection
        .call_tool("echo", &json!("not an object"))
        .await
        .err()
        .expect("argument error");
    assert_eq!(err, "Tool arguments must be a JSON object.");
    connection.close().await;
}

#[cfg(unix)]
#[tokio::test]
async fn every_page_of_a_large_tool_list_is_kept() {
    let connection = McpServerConnection::connect(&paginated_server_config("paged", 70))
        .await
        .expect("connect paginated server");

    let tools = connection.list_tools().await.expect("list tools");
    assert_eq!(tools.len(), 140);
    assert_eq!(tools[0].name, "tool_0");
    assert_eq!(tools[139].name, "tool_139");

    connection.close().await;
}

use crate::core::config::data::McpServerConfig;
use crate::mcp::registry::ToolDescriptor;
use crate::mcp::transport::{format_rpc_error, format_unexpected_server_message};
use rust_mcp_schema::schema_utils::ServerMessage;
use rust_mcp_schema::{InitializeResult, ListToolsResult, LATEST_PROTOCOL_VERSION};
use serde_json::Value;

pub(crate) fn requested_protocol_version(config: &McpServerConfig) -> String {
    config
        .protocol_version
        .clone()
        .unwrap_or_else(|| LATEST_PROTOCOL_VERSION.to_string())
}

pub(crate) fn effective_protocol_version(
    config: &McpServerConfig,
    negotiated_version: Option<&str>,
) -> String {
    match negotiated_version {
        Some(version) if !version.trim().is_empty() => version.to_string(),
        _ => requested_protocol_version(config),
    }
}

pub(crate) fn parse_initialize_result(message: ServerMessage) -> Result<InitializeResult, String> {
    let value = parse_response_value(message)?;
    let result =
        serde_json::from_value::<InitializeResult>(value).map_err(|err| err.to_string())?;
    if result.protocol_version.trim().is_empty() {
        return Err("Unexpected initialize response.".to_string());
    }
    Ok(result)
}

pub(crate) fn parse_list_tools(message: ServerMessage) -> Result<ListToolsResult, String> {
    let value = parse_response_value(message)?;
    serde_json::from_value::<ListToolsResult>(value).map_err(|err| err.to_string())
}

/// Extracts the `result` member of a response; JSON-RPC errors become `Err`.
pub(crate) fn parse_response_value(message: ServerMessage) -> Result<Value, String> {
    match message {
        ServerMessage::Response(response) => {
            serde_json::to_value(&response.result).map_err(|err| err.to_string())
        }
        ServerMessage::Error(error) => Err(format_rpc_error(&error.error)),
        other => Err(format_unexpected_server_message(&other)),
    }
}

/// Converts one listed tool into a registry descriptor, keeping the schema
/// as plain JSON.
pub(crate) fn tool_descriptor(tool: rust_mcp_schema::Tool) -> Result<ToolDescriptor, String> {
    let input_schema = serde_json::to_value(&tool.input_schema).map_err(|err| err.to_string())?;
    Ok(ToolDescriptor::new(tool.name, tool.description, input_schema))
}

//! Transport plumbing shared by the stdio and streamable HTTP MCP clients.

use crate::core::config::data::McpServerConfig;
use rust_mcp_schema::schema_utils::ServerMessage;
use rust_mcp_schema::RpcError;

pub mod streamable_http;

/// JSON-RPC code used by servers to indicate unsupported methods.
pub const MCP_METHOD_NOT_FOUND: i64 = -32601;

pub const MCP_JSON_CONTENT_TYPE: &str = "application/json";
pub const MCP_JSON_AND_SSE_ACCEPT: &str = "application/json, text/event-stream";
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

/// Supported MCP transport backends.
///
/// - [`McpTransportKind::Stdio`] for locally spawned processes.
/// - [`McpTransportKind::StreamableHttp`] for remote servers over HTTP/SSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpTransportKind {
    StreamableHttp,
    Stdio,
}

impl McpTransportKind {
    /// Resolves transport type from config, defaulting to streamable HTTP.
    ///
    /// The legacy `sse` kind is served by the streamable HTTP client, which
    /// accepts event-stream responses.
    pub fn from_config(config: &McpServerConfig) -> Result<Self, String> {
        let transport = config
            .transport
            .as_deref()
            .unwrap_or("streamable-http")
            .to_ascii_lowercase();
        match transport.as_str() {
            "streamable-http" | "streamable_http" | "http" | "sse" => {
                Ok(McpTransportKind::StreamableHttp)
            }
            "stdio" => Ok(McpTransportKind::Stdio),
            other => Err(format!("Unsupported MCP transport: {}", other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            McpTransportKind::StreamableHttp => "streamable-http",
            McpTransportKind::Stdio => "stdio",
        }
    }
}

/// Returns true when a server reports the JSON-RPC method-not-found code.
pub fn is_method_not_found(message: &ServerMessage) -> bool {
    matches!(
        message,
        ServerMessage::Error(error) if error.error.code == MCP_METHOD_NOT_FOUND
    )
}

pub fn apply_streamable_http_client_post_headers(
    request: reqwest::RequestBuilder,
) -> reqwest::RequestBuilder {
    request
        .header("Content-Type", MCP_JSON_CONTENT_TYPE)
        .header("Accept", MCP_JSON_AND_SSE_ACCEPT)
}

pub fn apply_streamable_http_protocol_version_header(
    request: reqwest::RequestBuilder,
    protocol_version: Option<&str>,
) -> reqwest::RequestBuilder {
    match protocol_version {
        Some(protocol_version) if !protocol_version.trim().is_empty() => {
            request.header(MCP_PROTOCOL_VERSION_HEADER, protocol_version)
        }
        _ => request,
    }
}

pub fn format_unexpected_server_message(message: &ServerMessage) -> String {
    format!("Unexpected MCP server message: {message:?}")
}

pub fn format_rpc_error(error: &RpcError) -> String {
    let mut output = format!("MCP error {}: {}", error.code, error.message);
    if let Some(data) = &error.data {
        let details = data
            .get("details")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
            .or_else(|| data.as_str().map(|value| value.to_string()))
            .or_else(|| serde_json::to_string_pretty(data).ok());

        if let Some(details) = details {
            if !details.is_empty() {
                output.push('\n');
                output.push_str(&details);
            }
        }
    }
    output
}

use crate::core::config::data::McpServerConfig;
use crate::core::normalize::RawToolResult;
use crate::mcp::registry::ToolDescriptor;
pub use crate::mcp::transport::McpTransportKind;
use crate::mcp::transport::is_method_not_found;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use rust_mcp_schema::schema_utils::{RequestFromClient, ServerMessage};
use rust_mcp_schema::{
    CallToolRequestParams, ClientCapabilities, Implementation, InitializeRequestParams,
    InitializeResult, ListToolsResult, PaginatedRequestParams,
};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

mod protocol;
mod transport_http;
mod transport_stdio;

use transport_http::HttpSession;
use transport_stdio::StdioClient;

const MCP_STARTUP_CONCURRENCY_LIMIT: usize = 3;

/// A connected source of tools.
///
/// Errors are plain strings: the orchestrator only logs them and hands the
/// model the generic failure payload.
#[async_trait]
pub trait ToolServer: Send + Sync {
    fn id(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, String>;

    async fn call_tool(&self, name: &str, input: &Value) -> Result<RawToolResult, String>;

    async fn close(&self);
}

#[derive(Error, Debug)]
pub enum McpError {
    #[error("Failed to connect to MCP server '{server_id}': {message}")]
    Connect { server_id: String, message: String },

    #[error("Failed to list tools on MCP server '{server_id}': {message}")]
    Discovery { server_id: String, message: String },

    #[error(transparent)]
    Registry(#[from] crate::mcp::registry::RegistryError),
}

enum Transport {
    Stdio(Arc<StdioClient>),
    Http(Mutex<HttpSession>),
}

/// One live MCP server: stdio child process or streamable HTTP session.
pub struct McpServerConnection {
    config: McpServerConfig,
    transport: Transport,
    server_details: InitializeResult,
}

impl McpServerConnection {
    /// Opens the transport and completes the initialize handshake.
    pub async fn connect(config: &McpServerConfig) -> Result<Self, String> {
        let kind = McpTransportKind::from_config(config)?;
        let details = client_details_for(config);
        debug!(server_id = %config.id, transport = kind.as_str(), "Connecting MCP server");

        let (transport, server_details) = match kind {
            McpTransportKind::Stdio => {
                let client = StdioClient::connect(config).await?;
                match client.initialize(details).await {
                    Ok(server_details) => (Transport::Stdio(client), server_details),
                    Err(err) => {
                        client.shutdown();
                        return Err(err);
                    }
                }
            }
            McpTransportKind::StreamableHttp => {
                let mut session = HttpSession::new(config)?;
                let server_details = session.initialize(details).await?;
                (Transport::Http(Mutex::new(session)), server_details)
            }
        };

        info!(
            server_id = %config.id,
            server_name = %server_details.server_info.name,
            protocol_version = %server_details.protocol_version,
            "Connected MCP server"
        );
        Ok(Self {
            config: config.clone(),
            transport,
            server_details,
        })
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub fn server_details(&self) -> &InitializeResult {
        &self.server_details
    }

    async fn send_request(&self, request: RequestFromClient) -> Result<ServerMessage, String> {
        match &self.transport {
            Transport::Stdio(client) => client.send_request(request).await,
            Transport::Http(session) => session.lock().await.send_request(request).await,
        }
    }

    /// One page of `tools/list`; `None` when the server has no tools support.
    async fn fetch_tools_page(
        &self,
        cursor: Option<String>,
    ) -> Result<Option<ListToolsResult>, String> {
        let params = paginated_params(cursor);
        let response = self
            .send_request(RequestFromClient::ListToolsRequest(params))
            .await?;
        if is_method_not_found(&response) {
            return Ok(None);
        }
        protocol::parse_list_tools(response).map(Some)
    }

    async fn fetch_all_tools(&self) -> Result<Vec<rust_mcp_schema::Tool>, String> {
        let mut tools = Vec::new();
        let mut cursor = None;
        loop {
            let Some(page) = self.fetch_tools_page(cursor).await? else {
                break;
            };
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }
}

#[async_trait]
impl ToolServer for McpServerConnection {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, String> {
        let tools = self.fetch_all_tools().await?;
        let mut descriptors = Vec::with_capacity(tools.len());
        for tool in tools {
            if self.config.is_tool_disabled(&tool.name) {
                debug!(server_id = %self.config.id, tool = %tool.name, "Skipping disabled MCP tool");
                continue;
            }
            descriptors.push(protocol::tool_descriptor(tool)?);
        }
        Ok(descriptors)
    }

    async fn call_tool(&self, name: &str, input: &Value) -> Result<RawToolResult, String> {
        let arguments = match input {
            Value::Object(map) => map.clone(),
            _ => return Err("Tool arguments must be a JSON object.".to_string()),
        };
        let params = CallToolRequestParams::new(name).with_arguments(arguments);
        debug!(server_id = %self.config.id, tool = %name, "Calling MCP tool");
        let response = self
            .send_request(RequestFromClient::CallToolRequest(params))
            .await?;
        let value = protocol::parse_response_value(response)?;
        Ok(RawToolResult::from_response_value(value))
    }

    async fn close(&self) {
        match &self.transport {
            Transport::Stdio(client) => client.shutdown(),
            Transport::Http(session) => session.lock().await.terminate().await,
        }
        debug!(server_id = %self.config.id, "Closed MCP server");
    }
}

/// Connects every enabled server, a few at a time.
///
/// Any failure is fatal: connections that did open are closed before the
/// first error (in configuration order) is returned.
pub async fn connect_all(
    configs: &[McpServerConfig],
) -> Result<Vec<McpServerConnection>, McpError> {
    let enabled: Vec<&McpServerConfig> = configs.iter().filter(|c| c.is_enabled()).collect();
    for skipped in configs.iter().filter(|c| !c.is_enabled()) {
        debug!(server_id = %skipped.id, "Skipping disabled MCP server");
    }

    let results: Vec<(String, Result<McpServerConnection, String>)> = stream::iter(enabled)
        .map(|config| async move {
            (config.id.clone(), McpServerConnection::connect(config).await)
        })
        .buffered(MCP_STARTUP_CONCURRENCY_LIMIT)
        .collect()
        .await;

    let mut connections = Vec::with_capacity(results.len());
    let mut first_error = None;
    for (server_id, result) in results {
        match result {
            Ok(connection) => connections.push(connection),
            Err(message) if first_error.is_none() => {
                first_error = Some(McpError::Connect { server_id, message });
            }
            Err(message) => {
                debug!(server_id = %server_id, error = %message, "Additional MCP connection failure");
            }
        }
    }

    if let Some(err) = first_error {
        for connection in &connections {
            connection.close().await;
        }
        return Err(err);
    }
    Ok(connections)
}

fn client_details_for(config: &McpServerConfig) -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("chat-mcp".to_string()),
            description: Some(env!("CARGO_PKG_DESCRIPTION").to_string()),
            icons: Vec::new(),
            website_url: None,
        },
        meta: None,
        protocol_version: protocol::requested_protocol_version(config),
    }
}

fn paginated_params(cursor: Option<String>) -> Option<PaginatedRequestParams> {
    cursor.map(|cursor| PaginatedRequestParams {
        cursor: Some(cursor),
        meta: None,
    })
}

#[cfg(test)]
mod tests;

use crate::core::config::data::{Config, McpServerConfig};
use crate::core::config::io::ConfigError;
use crate::mcp::registry::validate_server_id;
use crate::mcp::transport::McpTransportKind;
use crate::utils::url::has_http_scheme;
use std::collections::HashSet;

impl Config {
    /// Checks every configured MCP server, enabled or not.
    pub fn validate_mcp_servers(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for server in &self.mcp_servers {
            validate_server_id(&server.id)
                .map_err(|err| ConfigError::invalid(err.to_string()))?;
            if !seen.insert(server.id.to_ascii_lowercase()) {
                return Err(ConfigError::invalid(format!(
                    "MCP server '{}' is defined more than once",
                    server.id
                )));
            }
            validate_transport(server)?;
        }
        Ok(())
    }
}

fn validate_transport(server: &McpServerConfig) -> Result<(), ConfigError> {
    let kind = McpTransportKind::from_config(server)
        .map_err(|err| ConfigError::invalid(format!("MCP server '{}': {err}", server.id)))?;
    let missing = match kind {
        McpTransportKind::Stdio => is_blank(server.command.as_deref()).then_some("command"),
        McpTransportKind::StreamableHttp => is_blank(server.url.as_deref()).then_some("url"),
    };
    if let Some(field) = missing {
        return Err(ConfigError::invalid(format!(
            "MCP server '{}' requires `{field}` for {} transport",
            server.id,
            kind.as_str()
        )));
    }
    if let (McpTransportKind::StreamableHttp, Some(url)) = (kind, server.url.as_deref()) {
        if !has_http_scheme(url) {
            return Err(ConfigError::invalid(format!(
                "MCP server '{}' url must start with http:// or https://",
                server.id
            )));
        }
    }
    Ok(())
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|value| value.trim().is_empty())
}

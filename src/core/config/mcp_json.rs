//! Import of the `mcp.json` server list used by earlier releases.
//!
//! ```json
//! { "servers": { "files": { "type": "stdio", "command": "npx", "disabledTools": ["rm"] } } }
//! ```

use crate::core::config::data::McpServerConfig;
use crate::core::config::io::ConfigError;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

pub const MCP_JSON_FILE_NAME: &str = "mcp.json";

#[derive(Debug, Deserialize)]
struct McpJsonFile {
    #[serde(default)]
    servers: BTreeMap<String, McpJsonServer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct McpJsonServer {
    #[serde(rename = "type")]
    kind: String,
    url: Option<String>,
    headers: Option<BTreeMap<String, String>>,
    command: Option<String>,
    args: Option<Vec<String>>,
    env: Option<HashMap<String, String>>,
    disabled: Option<bool>,
    disabled_tools: Option<Vec<String>>,
}

impl McpJsonServer {
    fn into_config(self, id: String) -> McpServerConfig {
        McpServerConfig {
            id,
            transport: Some(self.kind),
            command: self.command,
            args: self.args,
            env: self.env,
            url: self.url,
            headers: self.headers,
            enabled: self.disabled.map(|disabled| !disabled),
            disabled_tools: self.disabled_tools,
            protocol_version: None,
        }
    }
}

pub fn parse_mcp_json(contents: &str) -> Result<Vec<McpServerConfig>, serde_json::Error> {
    let file: McpJsonFile = serde_json::from_str(contents)?;
    Ok(file
        .servers
        .into_iter()
        .map(|(id, server)| server.into_config(id))
        .collect())
}

/// Reads `path` if it exists. A missing file yields no servers.
pub fn load_mcp_json(path: &Path) -> Result<Vec<McpServerConfig>, ConfigError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_mcp_json(&contents).map_err(|source| ConfigError::ParseJson {
        path: path.to_path_buf(),
        source,
    })
}

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 25;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    /// Provider id: `openai`, `anthropic`, `google`, `openrouter` or `custom`.
    pub id: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    /// Required for `custom`; overrides the built-in URL otherwise.
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct McpServerConfig {
    pub id: String,
    /// `stdio`, `http`, `streamable-http` or `sse`. Defaults to streamable HTTP.
    pub transport: Option<String>,
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub env: Option<HashMap<String, String>>,
    pub url: Option<String>,
    /// Sent verbatim on every HTTP request.
    pub headers: Option<BTreeMap<String, String>>,
    pub enabled: Option<bool>,
    pub disabled_tools: Option<Vec<String>>,
    pub protocol_version: Option<String>,
}

impl McpServerConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn is_tool_disabled(&self, tool_name: &str) -> bool {
        self.disabled_tools
            .as_ref()
            .is_some_and(|tools| tools.iter().any(|tool| tool == tool_name))
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Model turns allowed per submission. `0` disables the bound.
    pub max_tool_iterations: Option<usize>,
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
}

impl Config {
    pub fn max_tool_iterations(&self) -> Option<usize> {
        match self.max_tool_iterations.unwrap_or(DEFAULT_MAX_TOOL_ITERATIONS) {
            0 => None,
            limit => Some(limit),
        }
    }

    pub fn get_mcp_server(&self, id: &str) -> Option<&McpServerConfig> {
        self.mcp_servers
            .iter()
            .find(|server| server.id.eq_ignore_ascii_case(id))
    }

    pub fn enabled_mcp_servers(&self) -> impl Iterator<Item = &McpServerConfig> {
        self.mcp_servers.iter().filter(|server| server.is_enabled())
    }

    /// Appends servers whose ids are not already configured. Returns the ids
    /// that were skipped because the TOML file already defines them.
    pub fn merge_mcp_servers(&mut self, servers: Vec<McpServerConfig>) -> Vec<String> {
        let mut skipped = Vec::new();
        for server in servers {
            if self.get_mcp_server(&server.id).is_some() {
                skipped.push(server.id);
            } else {
                self.mcp_servers.push(server);
            }
        }
        skipped
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

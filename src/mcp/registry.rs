//! Flat, server-qualified namespace of every tool the model may call.
//!
//! Tools are advertised to the model as `mcp__<server_id>__<tool_name>`.
//! Server ids may not contain the `__` delimiter nor end in `_`, so the
//! first delimiter after the prefix always separates the server from the
//! tool. Resolution still goes through the owner recorded for each key.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const QUALIFIED_TOOL_PREFIX: &str = "mcp__";
pub const QUALIFIED_TOOL_DELIMITER: &str = "__";

/// A tool as discovered on one server, before qualification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: Option<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description,
            input_schema,
        }
    }
}

/// What the model sees for one qualified tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub description: Option<String>,
    pub input_schema: Value,
}

pub type ToolCatalog = BTreeMap<String, CatalogEntry>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    pub server_id: String,
    pub tool_name: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("MCP server id must not be empty")]
    EmptyServerId,

    #[error("MCP server id '{0}' must not contain '__'")]
    DelimiterInServerId(String),

    #[error("MCP server id '{0}' must not end with '_'")]
    TrailingUnderscoreInServerId(String),

    #[error("MCP tool name '{qualified}' from server '{server_id}' is already provided by '{owner}'")]
    QualifiedNameCollision {
        qualified: String,
        server_id: String,
        owner: String,
    },

    #[error("MCP server '{server_id}' reported a tool with an empty name")]
    EmptyToolName { server_id: String },

    #[error("MCP server '{server_id}' reported tool '{tool_name}' more than once")]
    DuplicateTool { server_id: String, tool_name: String },
}

pub fn qualify(server_id: &str, tool_name: &str) -> String {
    format!("{QUALIFIED_TOOL_PREFIX}{server_id}{QUALIFIED_TOOL_DELIMITER}{tool_name}")
}

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    servers: BTreeMap<String, Vec<ToolDescriptor>>,
    catalog: ToolCatalog,
    owners: BTreeMap<String, ResolvedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every descriptor previously registered under `server_id`.
    ///
    /// The set is validated up front; on error the registry is unchanged.
    pub fn register(
        &mut self,
        server_id: &str,
        descriptors: Vec<ToolDescriptor>,
    ) -> Result<(), RegistryError> {
        validate_server_id(server_id)?;

        let mut seen = std::collections::HashSet::new();
        for descriptor in &descriptors {
            let qualified = qualify(server_id, &descriptor.name);
            if let Some(owner) = self.owners.get(&qualified) {
                if owner.server_id != server_id {
                    return Err(RegistryError::QualifiedNameCollision {
                        qualified,
                        server_id: server_id.to_string(),
                        owner: owner.server_id.clone(),
                    });
                }
            }
            if descriptor.name.trim().is_empty() {
                return Err(RegistryError::EmptyToolName {
                    server_id: server_id.to_string(),
                });
            }
            if !seen.insert(descriptor.name.as_str()) {
                return Err(RegistryError::DuplicateTool {
                    server_id: server_id.to_string(),
                    tool_name: descriptor.name.clone(),
                });
            }
        }

        self.servers.insert(server_id.to_string(), descriptors);
        self.rebuild_catalog();
        Ok(())
    }

    pub fn unregister(&mut self, server_id: &str) -> bool {
        let removed = self.servers.remove(server_id).is_some();
        if removed {
            self.rebuild_catalog();
        }
        removed
    }

    pub fn resolve(&self, qualified: &str) -> Option<ResolvedTool> {
        self.owners.get(qualified).cloned()
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn server_ids(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }

    pub fn tools_for(&self, server_id: &str) -> Option<&[ToolDescriptor]> {
        self.servers.get(server_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    fn rebuild_catalog(&mut self) {
        self.catalog.clear();
        self.owners.clear();
        for (server_id, descriptors) in &self.servers {
            for descriptor in descriptors {
                let qualified = qualify(server_id, &descriptor.name);
                self.catalog.insert(
                    qualified.clone(),
                    CatalogEntry {
                        description: descriptor.description.clone(),
                        input_schema: descriptor.input_schema.clone(),
                    },
                );
                self.owners.insert(
                    qualified,
                    ResolvedTool {
                        server_id: server_id.clone(),
                        tool_name: descriptor.name.clone(),
                    },
                );
            }
        }
    }
}

pub fn validate_server_id(server_id: &str) -> Result<(), RegistryError> {
    if server_id.trim().is_empty() {
        return Err(RegistryError::EmptyServerId);
    }
    if server_id.contains(QUALIFIED_TOOL_DELIMITER) {
        return Err(RegistryError::DelimiterInServerId(server_id.to_string()));
    }
    if server_id.ends_with('_') {
        return Err(RegistryError::TrailingUnderscoreInServerId(server_id.to_string()));
    }
    Ok(())
}

pub mod config_json;
pub mod data;
pub mod io;
pub mod mcp_json;
pub mod validate;

pub use data::{Config, McpServerConfig, ProviderConfig};
pub use io::ConfigError;

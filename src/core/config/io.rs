use crate::core::config::data::{path_display, Config, ProviderConfig};
use crate::core::config::config_json::load_config_json;
use crate::core::config::mcp_json::load_mcp_json;
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Errors that can occur when loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read a configuration file from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Failed to parse a legacy `mcp.json` or `config.json` file.
    ParseJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The platform exposes no configuration directory.
    NoConfigDir,

    /// The configuration parsed but cannot be used.
    Invalid { message: String },
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }

    fn display_path(path: &Path) -> String {
        path_display(path)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(
                    f,
                    "Failed to read config at {}: {}",
                    Self::display_path(path),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    Self::display_path(path),
                    source
                )
            }
            ConfigError::ParseJson { path, source } => {
                write!(
                    f,
                    "Failed to parse {}: {}",
                    Self::display_path(path),
                    source
                )
            }
            ConfigError::NoConfigDir => write!(f, "Failed to determine config directory"),
            ConfigError::Invalid { message } => write!(f, "Invalid configuration: {message}"),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::ParseJson { source, .. } => Some(source),
            ConfigError::NoConfigDir | ConfigError::Invalid { .. } => None,
        }
    }
}

impl Config {
    /// Loads the TOML config, returning defaults when the file is absent.
    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    /// Loads the TOML config, merges the legacy server list and provider
    /// settings, and validates the result.
    ///
    /// `config.json` only applies when `config.toml` has no `[provider]`
    /// settings at all.
    pub fn load_merged(
        config_path: &Path,
        mcp_json_path: &Path,
        config_json_path: &Path,
    ) -> Result<Config, ConfigError> {
        let mut config = Config::load_from_path(config_path)?;
        if let Some(provider) = load_config_json(config_json_path)? {
            if config.provider == ProviderConfig::default() {
                debug!(path = %config_json_path.display(), "Importing provider from config.json");
                config.provider = provider;
            } else {
                warn!(
                    path = %config_json_path.display(),
                    "Ignoring config.json; config.toml already sets [provider]"
                );
            }
        }
        let legacy = load_mcp_json(mcp_json_path)?;
        if !legacy.is_empty() {
            debug!(
                path = %mcp_json_path.display(),
                servers = legacy.len(),
                "Importing MCP servers from mcp.json"
            );
        }
        for id in config.merge_mcp_servers(legacy) {
            warn!(server_id = %id, "Ignoring mcp.json server already defined in config.toml");
        }
        config.validate_mcp_servers()?;
        Ok(config)
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let proj_dirs =
            ProjectDirs::from("org", "chatmcp", "chat-mcp").ok_or(ConfigError::NoConfigDir)?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

//! Import of the `config.json` provider settings used by earlier releases.
//!
//! ```json
//! { "apiProvider": "openrouter", "model": "mistralai/devstral-2512:free", "apiKey": "..." }
//! ```

use crate::core::config::data::ProviderConfig;
use crate::core::config::io::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const CONFIG_JSON_FILE_NAME: &str = "config.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigJsonFile {
    api_provider: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
}

pub fn parse_config_json(contents: &str) -> Result<ProviderConfig, serde_json::Error> {
    let file: ConfigJsonFile = serde_json::from_str(contents)?;
    Ok(ProviderConfig {
        id: file.api_provider,
        model: file.model,
        api_key: file.api_key,
        base_url: None,
    })
}

/// Reads `path` if it exists. A missing file yields `None`.
pub fn load_config_json(path: &Path) -> Result<Option<ProviderConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_json(&contents)
        .map(Some)
        .map_err(|source| ConfigError::ParseJson {
            path: path.to_path_buf(),
            source,
        })
}

//! Built-in provider table
//!
//! Every built-in provider is reached through its OpenAI-compatible chat
//! completions endpoint. The table is embedded from `builtin_models.toml`.

use serde::{Deserialize, Serialize};

pub const CUSTOM_PROVIDER_ID: &str = "custom";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinProvider {
    pub id: String,
    pub display_name: String,
    pub base_url: String,
    /// Environment variables consulted, in order, when no key is configured.
    #[serde(default)]
    pub api_key_env: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BuiltinProvidersConfig {
    providers: Vec<BuiltinProvider>,
}

impl BuiltinProvider {
    /// First non-blank API key found in the provider's environment variables.
    pub fn api_key_from_env(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.api_key_env
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.trim().is_empty())
    }
}

/// Load built-in providers from the embedded configuration
pub fn load_builtin_providers() -> Vec<BuiltinProvider> {
    const CONFIG_CONTENT: &str = include_str!("../builtin_models.toml");

    let config: BuiltinProvidersConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_models.toml");

    config.providers
}

/// Find a built-in provider by ID (case-insensitive)
pub fn find_builtin_provider(id: &str) -> Option<BuiltinProvider> {
    load_builtin_providers()
        .into_iter()
        .find(|p| p.id.eq_ignore_ascii_case(id))
}

pub fn known_provider_ids() -> Vec<String> {
    let mut ids: Vec<String> = load_builtin_providers()
        .into_iter()
        .map(|provider| provider.id)
        .collect();
    ids.push(CUSTOM_PROVIDER_ID.to_string());
    ids
}

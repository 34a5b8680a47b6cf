use crate::core::builtin_providers::{find_builtin_provider, known_provider_ids, CUSTOM_PROVIDER_ID};
use crate::core::config::data::ProviderConfig;
use crate::core::config::io::ConfigError;

const DEFAULT_PROVIDER_ID: &str = "openai";

/// Everything needed to talk to one model endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderSession {
    pub provider_id: String,
    pub display_name: String,
    pub base_url: String,
    /// `None` only for custom endpoints that accept anonymous requests.
    pub api_key: Option<String>,
    pub model: String,
}

pub fn resolve_env_session(config: &ProviderConfig) -> Result<ProviderSession, ConfigError> {
    resolve_session(config, |name| std::env::var(name).ok())
}

pub fn resolve_session(
    config: &ProviderConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ProviderSession, ConfigError> {
    let provider_id = config
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_PROVIDER_ID)
        .to_ascii_lowercase();

    let model = config
        .model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .ok_or_else(|| ConfigError::invalid("a model must be configured ([provider] model)"))?
        .to_string();

    let configured_key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string);
    let configured_url = config
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string);

    if provider_id == CUSTOM_PROVIDER_ID {
        let base_url = configured_url.ok_or_else(|| {
            ConfigError::invalid("provider 'custom' requires [provider] base_url")
        })?;
        return Ok(ProviderSession {
            provider_id,
            display_name: "Custom".to_string(),
            base_url,
            api_key: configured_key,
            model,
        });
    }

    let builtin = find_builtin_provider(&provider_id).ok_or_else(|| {
        ConfigError::invalid(format!(
            "unknown provider '{provider_id}' (expected one of: {})",
            known_provider_ids().join(", ")
        ))
    })?;

    let api_key = configured_key
        .or_else(|| builtin.api_key_from_env(&env))
        .ok_or_else(|| {
            ConfigError::invalid(format!(
                "no API key for provider '{}'; set [provider] api_key or {}",
                builtin.id,
                builtin.api_key_env.join(" / ")
            ))
        })?;

    Ok(ProviderSession {
        provider_id: builtin.id,
        display_name: builtin.display_name,
        base_url: configured_url.unwrap_or(builtin.base_url),
        api_key: Some(api_key),
        model,
    })
}

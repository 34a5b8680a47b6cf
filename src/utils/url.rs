//! Base URL handling for provider and MCP endpoints.

/// Strips trailing slashes so endpoints can be appended uniformly.
///
/// ```
/// use chat_mcp::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://openrouter.ai/api/v1/"), "https://openrouter.ai/api/v1");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Joins a base URL and an endpoint path with exactly one slash.
///
/// ```
/// use chat_mcp::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.openai.com/v1/", "/chat/completions"),
///     "https://api.openai.com/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// True for absolute `http://` or `https://` URLs with a non-empty host part.
pub fn has_http_scheme(url: &str) -> bool {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    rest.is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'))
}

//! Authentication headers for model provider requests.

/// Adds `Authorization: Bearer <key>` when a key is present.
///
/// Every built-in provider is reached through its OpenAI-compatible
/// endpoint, which accepts bearer tokens. Custom endpoints may run without
/// a key.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    api_key: Option<&str>,
) -> reqwest::RequestBuilder {
    match api_key {
        Some(api_key) => request.header("Authorization", format!("Bearer {api_key}")),
        None => request,
    }
}

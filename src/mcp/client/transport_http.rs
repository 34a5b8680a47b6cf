//! MCP streamable HTTP: one POST per JSON-RPC message, replies as JSON or
//! as an event stream, session tracked through `mcp-session-id`.

use super::protocol;
use crate::core::config::data::McpServerConfig;
use crate::mcp::transport::streamable_http::{
    is_event_stream_content_type, next_sse_server_message,
};
use crate::mcp::transport::{
    apply_streamable_http_client_post_headers, apply_streamable_http_protocol_version_header,
    MCP_SESSION_ID_HEADER,
};
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ServerMessage,
};
use rust_mcp_schema::{InitializeRequestParams, InitializeResult, RequestId};
use std::time::Duration;
use tracing::debug;

const MCP_HTTP_CONNECT_TIMEOUT_SECONDS: u64 = 10;
const MCP_HTTP_REQUEST_TIMEOUT_SECONDS: u64 = 60;
const MCP_HTTP_POOL_IDLE_TIMEOUT_SECONDS: u64 = 90;
const MCP_HTTP_POOL_MAX_IDLE_PER_HOST: usize = 8;

pub(crate) fn build_mcp_http_client() -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(MCP_HTTP_CONNECT_TIMEOUT_SECONDS))
        .timeout(Duration::from_secs(MCP_HTTP_REQUEST_TIMEOUT_SECONDS))
        .pool_idle_timeout(Duration::from_secs(MCP_HTTP_POOL_IDLE_TIMEOUT_SECONDS))
        .pool_max_idle_per_host(MCP_HTTP_POOL_MAX_IDLE_PER_HOST)
        .build()
        .map_err(|err| err.to_string())
}

pub(crate) fn require_http_url(config: &McpServerConfig) -> Result<String, String> {
    config
        .url
        .clone()
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| "MCP url is required for HTTP transports.".to_string())
}

/// Mutable per-server HTTP state. Callers serialize access.
pub(crate) struct HttpSession {
    config: McpServerConfig,
    url: String,
    client: reqwest::Client,
    session_id: Option<String>,
    negotiated_protocol_version: Option<String>,
    next_request_id: i64,
}

impl HttpSession {
    pub(crate) fn new(config: &McpServerConfig) -> Result<Self, String> {
        Ok(Self {
            url: require_http_url(config)?,
            config: config.clone(),
            client: build_mcp_http_client()?,
            session_id: None,
            negotiated_protocol_version: None,
            next_request_id: 0,
        })
    }

    pub(crate) fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn effective_protocol_version(&self) -> String {
        protocol::effective_protocol_version(
            &self.config,
            self.negotiated_protocol_version.as_deref(),
        )
    }

    /// Runs the initialize handshake. Servers that do not issue a session id
    /// are stateless and are used without one.
    pub(crate) async fn initialize(
        &mut self,
        details: InitializeRequestParams,
    ) -> Result<InitializeResult, String> {
        let response = self
            .send_request(RequestFromClient::InitializeRequest(details))
            .await?;
        let initialize = protocol::parse_initialize_result(response)?;
        self.negotiated_protocol_version = Some(initialize.protocol_version.clone());
        if self.session_id.is_none() {
            debug!(server_id = %self.config.id, "MCP HTTP server did not issue a session id");
        }

        self.send_notification(NotificationFromClient::InitializedNotification(None))
            .await?;
        Ok(initialize)
    }

    pub(crate) async fn send_request(
        &mut self,
        request: RequestFromClient,
    ) -> Result<ServerMessage, String> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(RequestId::Integer(request_id)),
        )
        .map_err(|err| err.to_string())?;

        let response = self.post(&message).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        if is_event_stream_content_type(&content_type) {
            next_sse_server_message(&self.config.id, response).await
        } else {
            let body = response.bytes().await.map_err(|err| err.to_string())?;
            serde_json::from_slice::<ServerMessage>(&body).map_err(|err| err.to_string())
        }
    }

    async fn send_notification(
        &mut self,
        notification: NotificationFromClient,
    ) -> Result<(), String> {
        let message = ClientMessage::from_message(
            MessageFromClient::NotificationFromClient(notification),
            None,
        )
        .map_err(|err| err.to_string())?;
        self.post(&message).await.map(|_| ())
    }

    async fn post(&mut self, message: &ClientMessage) -> Result<reqwest::Response, String> {
        let payload = serde_json::to_string(message).map_err(|err| err.to_string())?;
        debug!(server_id = %self.config.id, url = %self.url, "Sending MCP HTTP request");
        let protocol_version = self.effective_protocol_version();
        let request = apply_streamable_http_protocol_version_header(
            apply_streamable_http_client_post_headers(self.client.post(&self.url)),
            Some(protocol_version.as_str()),
        )
        .body(payload);

        let response = self
            .apply_session_headers(request)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()));
        }
        if let Some(session_id) = response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            self.session_id = Some(session_id.to_string());
        }
        Ok(response)
    }

    fn apply_session_headers(
        &self,
        mut request: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        if let Some(headers) = &self.config.headers {
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
        }
        if let Some(session_id) = &self.session_id {
            request = request.header(MCP_SESSION_ID_HEADER, session_id.as_str());
        }
        request
    }

    /// Ends the server-side session. Failures are ignored.
    pub(crate) async fn terminate(&mut self) {
        let Some(session_id) = self.session_id.take() else {
            return;
        };
        let request = self
            .client
            .delete(&self.url)
            .header(MCP_SESSION_ID_HEADER, session_id);
        if let Err(err) = request.send().await {
            debug!(server_id = %self.config.id, error = %err, "MCP HTTP session termination failed");
        }
    }

    #[cfg(test)]
    pub(crate) fn build_post_for_test(&self) -> reqwest::Request {
        let request = apply_streamable_http_client_post_headers(self.client.post(&self.url));
        self.apply_session_headers(request)
            .build()
            .expect("request should build")
    }

    #[cfg(test)]
    pub(crate) fn set_session_id_for_test(&mut self, session_id: &str) {
        self.session_id = Some(session_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn http_config(url: Option<&str>) -> McpServerConfig {
        McpServerConfig {
            id: "remote".to_string(),
            transport: Some("http".to_string()),
            url: url.map(str::to_string),
            headers: Some(BTreeMap::from([(
                "X-Api-Key".to_string(),
                "secret".to_string(),
            )])),
            ..Default::default()
        }
    }

    #[test]
    fn session_requires_url() {
        let err = HttpSession::new(&http_config(None))
            .err()
            .expect("missing url");
        assert_eq!(err, "MCP url is required for HTTP transports.");
    }

    #[test]
    fn configured_headers_and_session_are_forwarded() {
        let mut session =
            HttpSession::new(&http_config(Some("https://mcp.example.com/mcp"))).expect("session");
        let request = session.build_post_for_test();
        assert_eq!(request.headers()["X-Api-Key"], "secret");
        assert_eq!(request.headers()["Accept"], "application/json, text/event-stream");
        assert!(request.headers().get(MCP_SESSION_ID_HEADER).is_none());

        session.set_session_id_for_test("abc");
        let request = session.build_post_for_test();
        assert_eq!(request.headers()[MCP_SESSION_ID_HEADER], "abc");
        assert_eq!(session.session_id(), Some("abc"));
    }
}

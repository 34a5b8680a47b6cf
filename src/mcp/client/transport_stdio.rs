//! Line-delimited JSON-RPC over a spawned server process.

use super::protocol::parse_initialize_result;
use crate::core::config::data::McpServerConfig;
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ServerMessage,
};
use rust_mcp_schema::{InitializeRequestParams, InitializeResult, RequestId, RpcError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const STDIO_REQUEST_TIMEOUT_SECONDS: u64 = 60;
const STDIO_WRITE_TIMEOUT_SECONDS: u64 = 10;

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<ServerMessage>>>>;
type SharedStdin = Arc<Mutex<ChildStdin>>;

pub(crate) struct StdioClient {
    server_id: String,
    stdin: SharedStdin,
    pending: PendingMap,
    next_request_id: AtomicI64,
    shutdown: CancellationToken,
}

pub(crate) fn require_stdio_command(config: &McpServerConfig) -> Result<String, String> {
    config
        .command
        .clone()
        .filter(|command| !command.trim().is_empty())
        .ok_or_else(|| "MCP command is required for stdio transport.".to_string())
}

impl StdioClient {
    pub(crate) async fn connect(config: &McpServerConfig) -> Result<Arc<Self>, String> {
        let command = require_stdio_command(config)?;
        let args = config.args.clone().unwrap_or_default();
        debug!(server_id = %config.id, command = %command, args = ?args, "Starting MCP stdio server");
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        if let Some(env) = &config.env {
            cmd.envs(env);
        }

        let mut child = cmd.spawn().map_err(|err| err.to_string())?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| "Unable to retrieve stdin.".to_string())?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| "Unable to retrieve stdout.".to_string())?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| "Unable to retrieve stderr.".to_string())?;

        let client = Arc::new(Self {
            server_id: config.id.clone(),
            stdin: Arc::new(Mutex::new(stdin)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_request_id: AtomicI64::new(0),
            shutdown: CancellationToken::new(),
        });

        Self::spawn_stdout_reader(
            client.pending.clone(),
            client.stdin.clone(),
            stdout,
            client.server_id.clone(),
        );
        Self::spawn_stderr_drain(stderr, client.server_id.clone());

        let pending = client.pending.clone();
        let shutdown = client.shutdown.clone();
        let server_id = client.server_id.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    debug!(server_id = %server_id, status = ?status, "MCP stdio server exited");
                }
                _ = shutdown.cancelled() => {
                    let _ = child.kill().await;
                    debug!(server_id = %server_id, "MCP stdio server stopped");
                }
            }
            // Dropping the senders fails every outstanding request.
            pending.lock().await.clear();
        });

        Ok(client)
    }

    fn spawn_stdout_reader(
        pending: PendingMap,
        stdin: SharedStdin,
        stdout: tokio::process::ChildStdout,
        server_id: String,
    ) {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                let value = match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(value) => value,
                    Err(_) => {
                        debug!(server_id = %server_id, "Skipping non-JSON MCP stdio line");
                        continue;
                    }
                };
                let items = match value {
                    serde_json::Value::Array(items) => items,
                    other => vec![other],
                };
                for item in items {
                    if let Ok(message) = serde_json::from_value::<ServerMessage>(item) {
                        Self::dispatch_message(&pending, &stdin, message, &server_id).await;
                    }
                }
            }
        });
    }

    fn spawn_stderr_drain(stderr: tokio::process::ChildStderr, server_id: String) {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                debug!(server_id = %server_id, stderr = %line, "MCP stdio server stderr");
            }
        });
    }

    async fn dispatch_message(
        pending: &PendingMap,
        stdin: &SharedStdin,
        message: ServerMessage,
        server_id: &str,
    ) {
        match &message {
            ServerMessage::Response(response) => {
                debug!(
                    server_id = %server_id,
                    response_id = ?response.id,
                    "Received MCP stdio response"
                );
                let waiter = pending.lock().await.remove(&response.id);
                if let Some(tx) = waiter {
                    let _ = tx.send(message);
                }
            }
            ServerMessage::Error(error) => {
                debug!(
                    server_id = %server_id,
                    error_id = ?error.id,
                    error_code = error.error.code,
                    "Received MCP stdio error"
                );
                if let Some(id) = error.id.as_ref() {
                    let waiter = pending.lock().await.remove(id);
                    if let Some(tx) = waiter {
                        let _ = tx.send(message);
                    }
                }
            }
            ServerMessage::Request(request) => {
                debug!(
                    server_id = %server_id,
                    method = %request.method(),
                    request_id = ?request.request_id(),
                    "Rejecting MCP stdio server request"
                );
                let error = RpcError::method_not_found()
                    .with_message("Unsupported MCP request from server.");
                let reply = ClientMessage::from_message(
                    MessageFromClient::Error(error),
                    Some(request.request_id().clone()),
                )
                .map_err(|err| err.to_string());
                let result = match reply {
                    Ok(reply) => write_message(stdin, &reply).await,
                    Err(err) => Err(err),
                };
                if let Err(err) = result {
                    warn!(server_id = %server_id, error = %err, "Failed to answer MCP server request");
                }
            }
            ServerMessage::Notification(_) => {
                debug!(server_id = %server_id, "Received MCP stdio notification");
            }
        }
    }

    fn next_request_id(&self) -> RequestId {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        RequestId::Integer(id)
    }

    pub(crate) async fn send_request(
        &self,
        request: RequestFromClient,
    ) -> Result<ServerMessage, String> {
        if self.shutdown.is_cancelled() {
            return Err("MCP client not connected.".to_string());
        }
        let request_id = self.next_request_id();
        debug!(server_id = %self.server_id, request_id = ?request_id, "Sending MCP stdio request");
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(request_id.clone()),
        )
        .map_err(|err| err.to_string())?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);

        if let Err(err) = write_message(&self.stdin, &message).await {
            self.pending.lock().await.remove(&request_id);
            return Err(err);
        }

        match timeout(Duration::from_secs(STDIO_REQUEST_TIMEOUT_SECONDS), rx).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err("MCP stdio response channel closed.".to_string()),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                debug!(
                    server_id = %self.server_id,
                    request_id = ?request_id,
                    "MCP stdio request timed out"
                );
                Err("MCP stdio request timed out.".to_string())
            }
        }
    }

    async fn send_notification(&self, notification: NotificationFromClient) -> Result<(), String> {
        let message = ClientMessage::from_message(
            MessageFromClient::NotificationFromClient(notification),
            None,
        )
        .map_err(|err| err.to_string())?;
        write_message(&self.stdin, &message).await
    }

    pub(crate) async fn initialize(
        &self,
        details: InitializeRequestParams,
    ) -> Result<InitializeResult, String> {
        let response = self
            .send_request(RequestFromClient::InitializeRequest(details))
            .await?;
        let result = parse_initialize_result(response)?;
        self.send_notification(NotificationFromClient::InitializedNotification(None))
            .await?;
        Ok(result)
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn write_message(stdin: &SharedStdin, message: &ClientMessage) -> Result<(), String> {
    let mut payload = serde_json::to_string(message).map_err(|err| err.to_string())?;
    payload.push('\n');
    let write_timeout = Duration::from_secs(STDIO_WRITE_TIMEOUT_SECONDS);
    let mut stdin = timeout(write_timeout, stdin.lock())
        .await
        .map_err(|_| "Timed out waiting for MCP stdio stdin lock.".to_string())?;
    timeout(write_timeout, stdin.write_all(payload.as_bytes()))
        .await
        .map_err(|_| "Timed out writing MCP stdio message.".to_string())?
        .map_err(|err| err.to_string())?;
    timeout(write_timeout, stdin.flush())
        .await
        .map_err(|_| "Timed out flushing MCP stdio message.".to_string())?
        .map_err(|err| err.to_string())
}

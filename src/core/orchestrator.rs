//! The tool-calling conversation loop.
//!
//! One [`Orchestrator`] owns the history, the tool registry and every
//! server connection of a conversation. [`Orchestrator::submit`] appends the
//! user's message and then alternates between model turns and tool dispatch
//! until the model answers without requesting a tool:
//!
//! ```text
//! AwaitingUserInput -> TurnInProgress -> (ToolDispatch -> TurnInProgress)* -> AwaitingUserInput
//! ```
//!
//! History is append-only. Each message becomes visible to observers the
//! moment it is appended, and tool results are always appended in the order
//! the model emitted the calls.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::message::{ContentPart, Message, ToolCallRequest, ToolCallResult, ToolOutput};
use crate::core::normalize::{normalize, RawToolResult};
use crate::core::provider::{ModelProvider, ProviderError};
use crate::core::stream_decoder::{LiveTurn, StreamDecoder};
use crate::mcp::client::{McpError, ToolServer};
use crate::mcp::registry::ToolRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    AwaitingUserInput,
    TurnInProgress,
    ToolDispatch,
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Stopped after {limit} model turns without a final answer")]
    IterationLimit { limit: usize },

    #[error("Interrupted by user")]
    Cancelled,

    #[error(transparent)]
    Mcp(#[from] McpError),
}

/// Read-only view of the conversation, used by the terminal and the
/// transcript log.
pub trait TranscriptObserver: Send {
    fn on_message(&mut self, _message: &Message) {}

    /// Called right after the result's message, with the call it answers.
    fn on_tool_result(&mut self, _request: &ToolCallRequest, _result: &ToolCallResult) {}

    fn on_live_turn(&mut self, _live: LiveTurn<'_>) {}

    fn on_state(&mut self, _state: OrchestratorState) {}
}

/// Position of a content part in the history: (message index, part index).
type PartPosition = (usize, usize);

#[derive(Debug, Clone, Copy)]
struct Correlation {
    request: PartPosition,
    result: Option<PartPosition>,
}

pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    servers: Vec<Box<dyn ToolServer>>,
    registry: ToolRegistry,
    history: Vec<Message>,
    correlations: HashMap<String, Correlation>,
    state: OrchestratorState,
    max_iterations: Option<usize>,
    observers: Vec<Box<dyn TranscriptObserver>>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            servers: Vec::new(),
            registry: ToolRegistry::new(),
            history: Vec::new(),
            correlations: HashMap::new(),
            state: OrchestratorState::AwaitingUserInput,
            max_iterations: None,
            observers: Vec::new(),
        }
    }

    /// Bounds the number of model turns one submission may take.
    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn TranscriptObserver>) {
        self.observers.push(observer);
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn server_ids(&self) -> impl Iterator<Item = &str> {
        self.servers.iter().map(|server| server.id())
    }

    /// The request with the given call id, if it is in the history.
    pub fn tool_call(&self, id: &str) -> Option<&ToolCallRequest> {
        let correlation = self.correlations.get(id)?;
        self.part_at(correlation.request)?.as_tool_call()
    }

    /// The result answering the given call id, once it has been appended.
    pub fn tool_result(&self, id: &str) -> Option<&ToolCallResult> {
        let position = self.correlations.get(id)?.result?;
        self.part_at(position)?.as_tool_result()
    }

    fn part_at(&self, (message, part): PartPosition) -> Option<&ContentPart> {
        self.history.get(message)?.content.get(part)
    }

    /// Lists a server's tools and takes ownership of the connection.
    ///
    /// A server already attached under the same id is replaced and closed.
    /// A server whose tools cannot be registered is closed.
    pub async fn attach_server(
        &mut self,
        server: Box<dyn ToolServer>,
    ) -> Result<(), OrchestratorError> {
        let server_id = server.id().to_string();
        if let Err(err) = self.discover(server.as_ref()).await {
            server.close().await;
            return Err(err);
        }

        if let Some(position) = self.servers.iter().position(|s| s.id() == server_id) {
            let previous = self.servers.remove(position);
            previous.close().await;
        }
        self.servers.push(server);
        Ok(())
    }

    /// Attaches every server, or none of them: on the first failure every
    /// connection, attached or not, is closed.
    pub async fn attach_all(
        &mut self,
        servers: Vec<Box<dyn ToolServer>>,
    ) -> Result<(), OrchestratorError> {
        let mut pending = servers.into_iter();
        while let Some(server) = pending.next() {
            if let Err(err) = self.attach_server(server).await {
                for server in pending {
                    server.close().await;
                }
                self.close().await;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Re-lists every connection. Each server's tool set is swapped
    /// atomically; a failing server keeps its previous tools.
    pub async fn rediscover(&mut self) -> Result<(), OrchestratorError> {
        let mut first_error = None;
        for server in &self.servers {
            if let Err(err) = discover_into(&mut self.registry, server.as_ref()).await {
                warn!(server_id = %server.id(), error = %err, "MCP tool discovery failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    async fn discover(&mut self, server: &dyn ToolServer) -> Result<(), OrchestratorError> {
        discover_into(&mut self.registry, server).await?;
        Ok(())
    }

    /// Closes every connection and forgets their tools.
    pub async fn close(&mut self) {
        for server in self.servers.drain(..) {
            server.close().await;
            self.registry.unregister(server.id());
        }
    }

    /// Appends the user's message and runs turns until the model stops
    /// calling tools.
    ///
    /// On error the history is left at a message boundary: partial model
    /// output is never appended.
    pub async fn submit(
        &mut self,
        text: &str,
        cancel_token: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        self.append(Message::user(text));
        let result = self.run_turns(cancel_token).await;
        self.set_state(OrchestratorState::AwaitingUserInput);
        if let Err(err) = &result {
            debug!(error = %err, "Submission ended early");
        }
        result
    }

    async fn run_turns(&mut self, cancel_token: &CancellationToken) -> Result<(), OrchestratorError> {
        let mut turns = 0;
        loop {
            if let Some(limit) = self.max_iterations {
                if turns >= limit {
                    warn!(limit, "Tool iteration limit reached");
                    return Err(OrchestratorError::IterationLimit { limit });
                }
            }
            turns += 1;

            self.set_state(OrchestratorState::TurnInProgress);
            let tool_calls = self.run_model_turn(cancel_token).await?;
            if tool_calls.is_empty() {
                return Ok(());
            }

            self.set_state(OrchestratorState::ToolDispatch);
            for call in tool_calls {
                let output = run_cancellable(cancel_token, self.invoke(&call)).await?;
                self.append(Message::tool_result(ToolCallResult {
                    tool_call_id: call.id,
                    tool_name: call.tool_name,
                    output,
                }));
            }
        }
    }

    /// Streams one turn, appends its assistant messages and returns the
    /// tool calls to dispatch.
    async fn run_model_turn(
        &mut self,
        cancel_token: &CancellationToken,
    ) -> Result<Vec<ToolCallRequest>, OrchestratorError> {
        let mut turn =
            self.provider
                .start_turn(&self.history, self.registry.catalog(), cancel_token.clone());
        let mut decoder = StreamDecoder::new();

        loop {
            let event = tokio::select! {
                _ = cancel_token.cancelled() => return Err(OrchestratorError::Cancelled),
                event = turn.next_event() => event,
            };
            let Some(event) = event else {
                break;
            };
            if decoder.apply(event) {
                let live = decoder.live();
                for observer in &mut self.observers {
                    observer.on_live_turn(live);
                }
            }
        }

        let response = run_cancellable(cancel_token, turn.finish())
            .await?
            .map_err(|err| match err {
                ProviderError::Cancelled => OrchestratorError::Cancelled,
                other => OrchestratorError::Provider(other),
            })?;
        let decoded = decoder.finish();

        for message in response.messages {
            self.append(message);
        }

        if decoded.tool_calls.is_empty() {
            Ok(response.tool_calls)
        } else {
            if decoded.tool_calls != response.tool_calls {
                debug!(
                    streamed = decoded.tool_calls.len(),
                    finalized = response.tool_calls.len(),
                    "Streamed tool calls differ from the finalized response"
                );
            }
            Ok(decoded.tool_calls)
        }
    }

    /// Resolves and invokes one call. Never fails: every problem becomes
    /// the failure output.
    async fn invoke(&self, call: &ToolCallRequest) -> ToolOutput {
        let raw = match self.registry.resolve(&call.tool_name) {
            None => RawToolResult::failed(format!("unknown tool '{}'", call.tool_name)),
            Some(resolved) => match self.servers.iter().find(|s| s.id() == resolved.server_id) {
                None => RawToolResult::failed(format!(
                    "MCP server '{}' is not connected",
                    resolved.server_id
                )),
                Some(server) => {
                    debug!(
                        tool_call_id = %call.id,
                        server_id = %resolved.server_id,
                        tool = %resolved.tool_name,
                        "Invoking tool"
                    );
                    server
                        .call_tool(&resolved.tool_name, &call.input)
                        .await
                        .unwrap_or_else(RawToolResult::failed)
                }
            },
        };

        if let RawToolResult::Failed { reason } = &raw {
            warn!(tool_call_id = %call.id, tool = %call.tool_name, reason = %reason, "Tool call failed");
        }
        normalize(&raw)
    }

    fn append(&mut self, message: Message) {
        let index = self.history.len();
        for (part_index, part) in message.content.iter().enumerate() {
            match part {
                ContentPart::ToolCall(call) => {
                    self.correlations.insert(
                        call.id.clone(),
                        Correlation {
                            request: (index, part_index),
                            result: None,
                        },
                    );
                }
                ContentPart::ToolResult(result) => {
                    if let Some(correlation) = self.correlations.get_mut(&result.tool_call_id) {
                        correlation.result = Some((index, part_index));
                    }
                }
                ContentPart::Text { .. } => {}
            }
        }
        self.history.push(message);

        let message = &self.history[index];
        for observer in &mut self.observers {
            observer.on_message(message);
        }
        for result in message.tool_results() {
            let request = self
                .correlations
                .get(&result.tool_call_id)
                .and_then(|correlation| {
                    let (message, part) = correlation.request;
                    self.history.get(message)?.content.get(part)?.as_tool_call()
                });
            if let Some(request) = request {
                for observer in &mut self.observers {
                    observer.on_tool_result(request, result);
                }
            }
        }
    }

    fn set_state(&mut self, state: OrchestratorState) {
        if self.state == state {
            return;
        }
        self.state = state;
        for observer in &mut self.observers {
            observer.on_state(state);
        }
    }
}

async fn discover_into(registry: &mut ToolRegistry, server: &dyn ToolServer) -> Result<(), McpError> {
    let server_id = server.id();
    let tools = server
        .list_tools()
        .await
        .map_err(|message| McpError::Discovery {
            server_id: server_id.to_string(),
            message,
        })?;
    let count = tools.len();
    registry.register(server_id, tools)?;
    info!(server_id = %server_id, tools = count, "Registered MCP tools");
    Ok(())
}

/// Races an operation against the conversation's cancellation token.
async fn run_cancellable<F, T>(
    cancel_token: &CancellationToken,
    operation: F,
) -> Result<T, OrchestratorError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        _ = cancel_token.cancelled() => Err(OrchestratorError::Cancelled),
        result = operation => Ok(result),
    }
}

//! Seam between the orchestrator and whatever streams model turns.
//!
//! A provider spawns one task per turn. The task pushes [`TurnEvent`]s into
//! an unbounded channel while the response streams in, then resolves a
//! oneshot with the finalized [`TurnResponse`]. Consumers drain events with
//! [`ModelTurn::next_event`] and only then call [`ModelTurn::finish`].

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::core::message::{Message, ToolCallRequest};
use crate::mcp::registry::ToolCatalog;

/// Incremental output of one model turn, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    TextStart,
    TextDelta(String),
    TextEnd,
    ReasoningStart,
    ReasoningDelta(String),
    ReasoningEnd,
    ToolInputStart { id: String, tool_name: String },
    ToolInputDelta { id: String, delta: String },
    /// A tool call whose input has been fully received.
    ToolCall(ToolCallRequest),
}

/// Finalized output of a model turn, available after the event stream ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnResponse {
    /// Assistant messages in provider order.
    pub messages: Vec<Message>,
    /// Tool calls in the order the model emitted them.
    pub tool_calls: Vec<ToolCallRequest>,
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("Stream ended unexpectedly")]
    StreamEnded,

    #[error("Request cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Handle to one in-flight model turn.
pub struct ModelTurn {
    events: mpsc::UnboundedReceiver<TurnEvent>,
    outcome: oneshot::Receiver<ProviderResult<TurnResponse>>,
}

/// Producer half handed to the task that streams a turn.
pub struct TurnSender {
    events: mpsc::UnboundedSender<TurnEvent>,
    outcome: oneshot::Sender<ProviderResult<TurnResponse>>,
}

impl ModelTurn {
    pub fn channel() -> (TurnSender, ModelTurn) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        (
            TurnSender {
                events: event_tx,
                outcome: outcome_tx,
            },
            ModelTurn {
                events: event_rx,
                outcome: outcome_rx,
            },
        )
    }

    /// Returns the next event, or `None` once the producer is done.
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        self.events.recv().await
    }

    pub async fn finish(self) -> ProviderResult<TurnResponse> {
        self.outcome.await.unwrap_or(Err(ProviderError::StreamEnded))
    }
}

impl TurnSender {
    pub fn emit(&self, event: TurnEvent) {
        let _ = self.events.send(event);
    }

    /// Resolves the turn. Dropping the event sender here closes the stream.
    pub fn complete(self, outcome: ProviderResult<TurnResponse>) {
        let TurnSender { events, outcome: tx } = self;
        drop(events);
        let _ = tx.send(outcome);
    }
}

/// Something that can stream a model turn given the history and tool catalog.
pub trait ModelProvider: Send + Sync {
    fn model_id(&self) -> &str;

    fn start_turn(
        &self,
        history: &[Message],
        catalog: &ToolCatalog,
        cancel_token: CancellationToken,
    ) -> ModelTurn;
}

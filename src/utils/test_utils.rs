//! Scripted collaborators for orchestrator tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::message::{ContentPart, Message, ToolCallRequest, ToolCallResult};
use crate::core::normalize::RawToolResult;
use crate::core::orchestrator::{OrchestratorState, TranscriptObserver};
use crate::core::provider::{
    ModelProvider, ModelTurn, ProviderError, TurnEvent, TurnResponse, TurnSender,
};
use crate::core::stream_decoder::LiveTurn;
use crate::mcp::client::ToolServer;
use crate::mcp::registry::{ToolCatalog, ToolDescriptor};

/// One canned model turn.
pub enum ScriptedTurn {
    Respond {
        events: Vec<TurnEvent>,
        response: TurnResponse,
    },
    Fail(ProviderError),
    /// Never completes; the sender is parked until the provider is dropped.
    Hang,
}

impl ScriptedTurn {
    pub fn text(text: &str) -> Self {
        ScriptedTurn::Respond {
            events: vec![
                TurnEvent::TextStart,
                TurnEvent::TextDelta(text.to_string()),
                TurnEvent::TextEnd,
            ],
            response: TurnResponse {
                messages: vec![Message::assistant(vec![ContentPart::text(text)])],
                tool_calls: Vec::new(),
            },
        }
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        let mut events = Vec::new();
        for call in &calls {
            events.push(TurnEvent::ToolInputStart {
                id: call.id.clone(),
                tool_name: call.tool_name.clone(),
            });
            events.push(TurnEvent::ToolInputDelta {
                id: call.id.clone(),
                delta: call.input.to_string(),
            });
            events.push(TurnEvent::ToolCall(call.clone()));
        }
        let content = calls.iter().cloned().map(ContentPart::ToolCall).collect();
        ScriptedTurn::Respond {
            events,
            response: TurnResponse {
                messages: vec![Message::assistant(content)],
                tool_calls: calls,
            },
        }
    }
}

/// What the provider saw when a turn started.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub history: Vec<Message>,
    pub catalog: ToolCatalog,
}

#[derive(Default)]
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<TurnRequest>>,
    parked: Mutex<Vec<TurnSender>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<ScriptedTurn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            ..Default::default()
        })
    }

    pub fn requests(&self) -> Vec<TurnRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ModelProvider for ScriptedProvider {
    fn model_id(&self) -> &str {
        "scripted-model"
    }

    fn start_turn(
        &self,
        history: &[Message],
        catalog: &ToolCatalog,
        _cancel_token: CancellationToken,
    ) -> ModelTurn {
        self.requests.lock().unwrap().push(TurnRequest {
            history: history.to_vec(),
            catalog: catalog.clone(),
        });

        let (sender, turn) = ModelTurn::channel();
        match self.turns.lock().unwrap().pop_front() {
            Some(ScriptedTurn::Respond { events, response }) => {
                for event in events {
                    sender.emit(event);
                }
                sender.complete(Ok(response));
            }
            Some(ScriptedTurn::Fail(err)) => sender.complete(Err(err)),
            Some(ScriptedTurn::Hang) => self.parked.lock().unwrap().push(sender),
            None => sender.complete(Err(ProviderError::StreamEnded)),
        }
        turn
    }
}

/// In-memory tool server with canned results per tool name.
pub struct FakeToolServer {
    id: String,
    pub tools: Arc<Mutex<Vec<ToolDescriptor>>>,
    results: HashMap<String, Result<RawToolResult, String>>,
    /// Tools whose calls never answer; the token is cancelled as the call starts.
    hanging: HashMap<String, CancellationToken>,
    pub calls: Arc<Mutex<Vec<(String, Value)>>>,
    pub closed: Arc<AtomicBool>,
}

impl FakeToolServer {
    pub fn new(id: &str, tool_names: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            tools: Arc::new(Mutex::new(descriptors(tool_names))),
            results: HashMap::new(),
            hanging: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_result(mut self, tool: &str, result: Result<RawToolResult, String>) -> Self {
        self.results.insert(tool.to_string(), result);
        self
    }

    pub fn with_hanging_call(mut self, tool: &str, cancel_token: CancellationToken) -> Self {
        self.hanging.insert(tool.to_string(), cancel_token);
        self
    }
}

pub fn descriptors(tool_names: &[&str]) -> Vec<ToolDescriptor> {
    tool_names
        .iter()
        .map(|name| {
            ToolDescriptor::new(
                *name,
                Some(format!("{name} tool")),
                serde_json::json!({"type": "object"}),
            )
        })
        .collect()
}

#[async_trait]
impl ToolServer for FakeToolServer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, String> {
        Ok(self.tools.lock().unwrap().clone())
    }

    async fn call_tool(&self, name: &str, input: &Value) -> Result<RawToolResult, String> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), input.clone()));
        if let Some(cancel_token) = self.hanging.get(name) {
            cancel_token.cancel();
            std::future::pending::<()>().await;
        }
        self.results
            .get(name)
            .cloned()
            .unwrap_or_else(|| Err(format!("no canned result for {name}")))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Observer that records every callback as a short string.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl TranscriptObserver for RecordingObserver {
    fn on_message(&mut self, message: &Message) {
        self.record(format!("message:{}", message.role.as_str()));
    }

    fn on_tool_result(&mut self, request: &ToolCallRequest, result: &ToolCallResult) {
        self.record(format!("result:{}:{}", request.tool_name, result.tool_call_id));
    }

    fn on_live_turn(&mut self, live: LiveTurn<'_>) {
        if !live.text.is_empty() {
            self.record(format!("live:{}", live.text));
        }
    }

    fn on_state(&mut self, state: OrchestratorState) {
        self.record(format!("state:{state:?}"));
    }
}

//! Streaming model turns from OpenAI-compatible `/chat/completions` endpoints.

use std::collections::BTreeMap;

use futures_util::StreamExt;
use memchr::memchr;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{
    ChatMessage, ChatRequest, ChatResponse, ChatResponseDelta, ChatToolCall, ChatToolCallDelta,
    ChatToolCallFunction, ChatToolDefinition, ChatToolFunction,
};
use crate::core::message::{ContentPart, Message, Role, ToolCallRequest};
use crate::core::provider::{
    ModelProvider, ModelTurn, ProviderError, ProviderResult, TurnEvent, TurnResponse, TurnSender,
};
use crate::core::providers::ProviderSession;
use crate::mcp::registry::ToolCatalog;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Handles one SSE line. Returns `Ok(true)` once the stream is complete.
fn process_sse_line(
    line: &str,
    provider: &str,
    accumulator: &mut TurnAccumulator,
    emit: &mut dyn FnMut(TurnEvent),
) -> ProviderResult<bool> {
    let Some(payload) = extract_data_payload(line) else {
        return Ok(false);
    };
    if payload == "[DONE]" {
        accumulator.completed = true;
        return Ok(true);
    }
    if payload.trim().is_empty() {
        return Ok(false);
    }

    let value: Value = serde_json::from_str(payload)
        .map_err(|_| ProviderError::invalid_response(provider, format_api_error(payload)))?;
    if value.get("error").is_some() {
        return Err(ProviderError::invalid_response(
            provider,
            format_api_error(payload),
        ));
    }
    let response: ChatResponse = serde_json::from_value(value)
        .map_err(|_| ProviderError::invalid_response(provider, format_api_error(payload)))?;

    for choice in response.choices {
        if choice.finish_reason.as_deref().is_some_and(|reason| !reason.is_empty()) {
            accumulator.completed = true;
        }
        accumulator.apply_delta(choice.delta, emit);
    }
    Ok(false)
}

fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                Value::String(s) => Some(s.to_string()),
                Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub(crate) fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            if let Some(summary) = extract_error_summary(&json_value) {
                if !summary.is_empty() {
                    return format!("API Error: {}\n```json\n{}\n```", summary, pretty_json);
                }
            }
            return format!("API Error:\n```json\n{}\n```", pretty_json);
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{}\n```", trimmed)
    } else {
        format!("API Error:\n```\n{}\n```", trimmed)
    }
}

#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    announced: bool,
}

/// Folds streamed deltas into turn events and the finalized response.
///
/// Tool call fragments are grouped by their `index`. A call is announced
/// with `ToolInputStart` once both its id and name are known; argument
/// fragments seen before that are replayed as a single delta.
#[derive(Debug, Default)]
pub(crate) struct TurnAccumulator {
    text: String,
    text_open: bool,
    reasoning_open: bool,
    calls: BTreeMap<u32, PendingCall>,
    /// Set by `[DONE]` or a `finish_reason`.
    completed: bool,
}

impl TurnAccumulator {
    pub(crate) fn apply_delta(&mut self, delta: ChatResponseDelta, emit: &mut dyn FnMut(TurnEvent)) {
        let reasoning = delta
            .reasoning_content
            .or(delta.reasoning)
            .filter(|text| !text.is_empty());
        if let Some(reasoning) = reasoning {
            if !self.reasoning_open {
                self.reasoning_open = true;
                emit(TurnEvent::ReasoningStart);
            }
            emit(TurnEvent::ReasoningDelta(reasoning));
        }

        if let Some(content) = delta.content.filter(|text| !text.is_empty()) {
            self.close_reasoning(emit);
            if !self.text_open {
                self.text_open = true;
                emit(TurnEvent::TextStart);
            }
            self.text.push_str(&content);
            emit(TurnEvent::TextDelta(content));
        }

        for call in delta.tool_calls.unwrap_or_default() {
            self.close_reasoning(emit);
            self.close_text(emit);
            self.apply_tool_delta(call, emit);
        }
    }

    fn apply_tool_delta(&mut self, call: ChatToolCallDelta, emit: &mut dyn FnMut(TurnEvent)) {
        let index = match call.index {
            Some(index) => index,
            None => self.index_for_unindexed(call.id.as_deref()),
        };
        let pending = self.calls.entry(index).or_default();

        if let Some(id) = call.id.filter(|id| !id.is_empty()) {
            pending.id.get_or_insert(id);
        }
        let arguments = match call.function {
            Some(function) => {
                if let Some(name) = function.name.filter(|name| !name.is_empty()) {
                    pending.name.get_or_insert(name);
                }
                function.arguments.unwrap_or_default()
            }
            None => String::new(),
        };
        pending.arguments.push_str(&arguments);

        match (&pending.id, &pending.name) {
            (Some(id), Some(name)) if !pending.announced => {
                pending.announced = true;
                emit(TurnEvent::ToolInputStart {
                    id: id.clone(),
                    tool_name: name.clone(),
                });
                if !pending.arguments.is_empty() {
                    emit(TurnEvent::ToolInputDelta {
                        id: id.clone(),
                        delta: pending.arguments.clone(),
                    });
                }
            }
            (Some(id), _) if pending.announced && !arguments.is_empty() => {
                emit(TurnEvent::ToolInputDelta {
                    id: id.clone(),
                    delta: arguments,
                });
            }
            _ => {}
        }
    }

    /// Some providers omit `index`; a new id starts a new call.
    fn index_for_unindexed(&self, id: Option<&str>) -> u32 {
        let last = self.calls.iter().next_back();
        match (id, last) {
            (_, None) => 0,
            (Some(id), Some((&index, pending))) if pending.id.as_deref() != Some(id) => {
                self.calls
                    .iter()
                    .find(|(_, call)| call.id.as_deref() == Some(id))
                    .map(|(&existing, _)| existing)
                    .unwrap_or(index + 1)
            }
            (_, Some((&index, _))) => index,
        }
    }

    fn close_text(&mut self, emit: &mut dyn FnMut(TurnEvent)) {
        if self.text_open {
            self.text_open = false;
            emit(TurnEvent::TextEnd);
        }
    }

    fn close_reasoning(&mut self, emit: &mut dyn FnMut(TurnEvent)) {
        if self.reasoning_open {
            self.reasoning_open = false;
            emit(TurnEvent::ReasoningEnd);
        }
    }

    /// Closes open segments, emits every finalized tool call and builds the
    /// assistant message for the turn.
    pub(crate) fn finish(mut self, emit: &mut dyn FnMut(TurnEvent)) -> TurnResponse {
        self.close_reasoning(emit);
        self.close_text(emit);

        let mut tool_calls = Vec::with_capacity(self.calls.len());
        for (index, pending) in std::mem::take(&mut self.calls) {
            let id = pending.id.unwrap_or_else(|| format!("call_{index}"));
            let tool_name = pending.name.unwrap_or_default();
            if tool_name.is_empty() {
                warn!(tool_call_id = %id, "Model emitted a tool call without a name");
            }
            let call = ToolCallRequest::new(id, tool_name, parse_tool_arguments(&pending.arguments));
            emit(TurnEvent::ToolCall(call.clone()));
            tool_calls.push(call);
        }

        let mut content = Vec::with_capacity(tool_calls.len() + 1);
        if !self.text.is_empty() {
            content.push(ContentPart::text(self.text));
        }
        content.extend(tool_calls.iter().cloned().map(ContentPart::ToolCall));
        if content.is_empty() {
            content.push(ContentPart::text(""));
        }

        TurnResponse {
            messages: vec![Message::assistant(content)],
            tool_calls,
        }
    }
}

/// Empty arguments mean "no input"; unparseable arguments are kept verbatim
/// so the tool server can report the problem.
fn parse_tool_arguments(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return json!({});
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub(crate) fn history_to_api_messages(history: &[Message]) -> Vec<ChatMessage> {
    let mut api_messages = Vec::with_capacity(history.len());
    for message in history {
        match message.role {
            Role::User => api_messages.push(ChatMessage {
                role: Role::User.as_str().to_string(),
                content: Some(message.text()),
                tool_call_id: None,
                tool_calls: None,
            }),
            Role::Assistant => {
                let tool_calls: Vec<ChatToolCall> = message
                    .tool_calls()
                    .map(|call| ChatToolCall {
                        id: call.id.clone(),
                        kind: "function".to_string(),
                        function: ChatToolCallFunction {
                            name: call.tool_name.clone(),
                            arguments: call.input.to_string(),
                        },
                    })
                    .collect();
                let text = message.text();
                let content = if text.is_empty() && !tool_calls.is_empty() {
                    None
                } else {
                    Some(text)
                };
                api_messages.push(ChatMessage {
                    role: Role::Assistant.as_str().to_string(),
                    content,
                    tool_call_id: None,
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                });
            }
            Role::Tool => {
                for result in message.tool_results() {
                    api_messages.push(ChatMessage {
                        role: Role::Tool.as_str().to_string(),
                        content: Some(result.output.to_model_text()),
                        tool_call_id: Some(result.tool_call_id.clone()),
                        tool_calls: None,
                    });
                }
            }
        }
    }
    api_messages
}

pub(crate) fn catalog_to_tools(catalog: &ToolCatalog) -> Option<Vec<ChatToolDefinition>> {
    if catalog.is_empty() {
        return None;
    }
    let tools = catalog
        .iter()
        .map(|(name, entry)| ChatToolDefinition {
            kind: "function".to_string(),
            function: ChatToolFunction {
                name: name.clone(),
                description: entry.description.clone(),
                parameters: if entry.input_schema.is_object() {
                    entry.input_schema.clone()
                } else {
                    json!({"type": "object"})
                },
            },
        })
        .collect();
    Some(tools)
}

/// [`ModelProvider`] backed by a streaming chat completions endpoint.
pub struct ChatStreamProvider {
    client: reqwest::Client,
    session: ProviderSession,
}

impl ChatStreamProvider {
    pub fn new(session: ProviderSession) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, session })
    }

    pub fn session(&self) -> &ProviderSession {
        &self.session
    }
}

impl ModelProvider for ChatStreamProvider {
    fn model_id(&self) -> &str {
        &self.session.model
    }

    fn start_turn(
        &self,
        history: &[Message],
        catalog: &ToolCatalog,
        cancel_token: CancellationToken,
    ) -> ModelTurn {
        let (sender, turn) = ModelTurn::channel();
        let request = ChatRequest {
            model: self.session.model.clone(),
            messages: history_to_api_messages(history),
            stream: true,
            tools: catalog_to_tools(catalog),
        };
        let client = self.client.clone();
        let session = self.session.clone();

        debug!(
            provider = %session.provider_id,
            model = %session.model,
            messages = request.messages.len(),
            tools = catalog.len(),
            "Starting model turn"
        );

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => Err(ProviderError::Cancelled),
                outcome = run_stream(&client, &session, &request, &sender) => outcome,
            };
            if let Err(err) = &outcome {
                debug!(provider = %session.provider_id, error = %err, "Model turn failed");
            }
            sender.complete(outcome);
        });

        turn
    }
}

async fn run_stream(
    client: &reqwest::Client,
    session: &ProviderSession,
    request: &ChatRequest,
    sender: &TurnSender,
) -> ProviderResult<TurnResponse> {
    let chat_url = construct_api_url(&session.base_url, "chat/completions");
    let http_request = client
        .post(chat_url)
        .header("Content-Type", "application/json");
    let http_request = add_auth_headers(http_request, session.api_key.as_deref());

    let response = http_request.json(request).send().await?;
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(ProviderError::Api {
            provider: session.display_name.clone(),
            status: status.as_u16(),
            message: format_api_error(&error_text),
        });
    }

    let provider = session.display_name.as_str();
    let mut accumulator = TurnAccumulator::default();
    let mut emit = |event: TurnEvent| sender.emit(event);
    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    'stream: while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);

        while let Some(newline_pos) = memchr(b'\n', &buffer) {
            let line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();
            let line = match std::str::from_utf8(&line_bytes) {
                Ok(line) => line.trim(),
                Err(err) => {
                    warn!(provider, error = %err, "Invalid UTF-8 in model stream");
                    continue;
                }
            };
            if process_sse_line(line, provider, &mut accumulator, &mut emit)? {
                break 'stream;
            }
        }
    }

    if let Ok(line) = std::str::from_utf8(&buffer) {
        process_sse_line(line.trim(), provider, &mut accumulator, &mut emit)?;
    }

    finish_stream(accumulator, &mut emit)
}

/// A body that ends before `[DONE]` or a `finish_reason` was cut off; its
/// partial output is discarded.
fn finish_stream(
    accumulator: TurnAccumulator,
    emit: &mut dyn FnMut(TurnEvent),
) -> ProviderResult<TurnResponse> {
    if !accumulator.completed {
        return Err(ProviderError::StreamEnded);
    }
    Ok(accumulator.finish(emit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{ToolCallResult, ToolOutput};
    use crate::mcp::registry::CatalogEntry;

    fn feed(lines: &[&str]) -> (Vec<TurnEvent>, TurnResponse) {
        let mut events = Vec::new();
        let mut accumulator = TurnAccumulator::default();
        {
            let mut emit = |event: TurnEvent| events.push(event);
            for line in lines {
                if process_sse_line(line, "Test", &mut accumulator, &mut emit).expect("line") {
                    break;
                }
            }
        }
        let response = accumulator.finish(&mut |event: TurnEvent| events.push(event));
        (events, response)
    }

    #[test]
    fn process_sse_line_handles_spacing_variants() {
        let variants = [
            (r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#, "data: [DONE]"),
            (r#"data:{"choices":[{"delta":{"content":"Hello"}}]}"#, "data:[DONE]"),
        ];

        for (chunk_line, done_line) in variants {
            let mut accumulator = TurnAccumulator::default();
            let mut events = Vec::new();
            let mut emit = |event: TurnEvent| events.push(event);
            assert!(!process_sse_line(chunk_line, "Test", &mut accumulator, &mut emit).unwrap());
            assert!(process_sse_line(done_line, "Test", &mut accumulator, &mut emit).unwrap());
            assert_eq!(
                events,
                vec![TurnEvent::TextStart, TurnEvent::TextDelta("Hello".to_string())]
            );
        }
    }

    fn feed_stream(lines: &[&str]) -> ProviderResult<TurnResponse> {
        let mut accumulator = TurnAccumulator::default();
        let mut emit = |_: TurnEvent| {};
        for line in lines {
            if process_sse_line(line, "Test", &mut accumulator, &mut emit)? {
                break;
            }
        }
        finish_stream(accumulator, &mut emit)
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let result = feed_stream(&[
            r#"data: {"choices":[{"delta":{"content":"Half an ans"}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"mcp__a__b","arguments":"{\"x\":"}}]}}]}"#,
        ]);
        assert!(matches!(result, Err(ProviderError::StreamEnded)));
    }

    #[test]
    fn finish_reason_or_done_completes_the_stream() {
        let response = feed_stream(&[
            r#"data: {"choices":[{"delta":{"content":"Hi"},"finish_reason":"stop"}]}"#,
        ])
        .expect("finish_reason completes");
        assert_eq!(response.messages, vec![Message::assistant(vec![ContentPart::text("Hi")])]);

        let response = feed_stream(&[
            r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#,
            "data: [DONE]",
        ])
        .expect("[DONE] completes");
        assert_eq!(response.messages, vec![Message::assistant(vec![ContentPart::text("Hi")])]);
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let (events, response) = feed(&[": keep-alive", "event: message", ""]);
        assert!(events.is_empty());
        assert_eq!(response.messages, vec![Message::assistant(vec![ContentPart::text("")])]);
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn process_sse_line_routes_stream_errors() {
        let mut accumulator = TurnAccumulator::default();
        let error_line = r#"data: {"error":{"message":"internal server error"}}"#;

        let err = process_sse_line(error_line, "Test", &mut accumulator, &mut |_| {})
            .expect_err("stream error");
        match err {
            ProviderError::InvalidResponse { provider, message } => {
                assert_eq!(provider, "Test");
                let expected = r#"API Error: internal server error
```json
{
  "error": {
    "message": "internal server error"
  }
}
```"#;
                assert_eq!(message, expected);
            }
            other => panic!("expected invalid response, got {other:?}"),
        }
    }

    #[test]
    fn text_then_tool_call_across_chunks() {
        let (events, response) = feed(&[
            r#"data: {"choices":[{"delta":{"content":"Let me check."}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call-1","type":"function","function":{"name":"mcp__files__read","arguments":""}}]}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"path\":"}}]}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"a.txt\"}"}}]},"finish_reason":"tool_calls"}]}"#,
            "data: [DONE]",
        ]);

        let call = ToolCallRequest::new("call-1", "mcp__files__read", json!({"path": "a.txt"}));
        assert_eq!(
            events,
            vec![
                TurnEvent::TextStart,
                TurnEvent::TextDelta("Let me check.".to_string()),
                TurnEvent::TextEnd,
                TurnEvent::ToolInputStart {
                    id: "call-1".to_string(),
                    tool_name: "mcp__files__read".to_string(),
                },
                TurnEvent::ToolInputDelta {
                    id: "call-1".to_string(),
                    delta: "{\"path\":".to_string(),
                },
                TurnEvent::ToolInputDelta {
                    id: "call-1".to_string(),
                    delta: "\"a.txt\"}".to_string(),
                },
                TurnEvent::ToolCall(call.clone()),
            ]
        );
        assert_eq!(response.tool_calls, vec![call.clone()]);
        assert_eq!(
            response.messages,
            vec![Message::assistant(vec![
                ContentPart::text("Let me check."),
                ContentPart::ToolCall(call),
            ])]
        );
    }

    #[test]
    fn unindexed_calls_are_split_by_id() {
        let (_, response) = feed(&[
            r#"data: {"choices":[{"delta":{"tool_calls":[{"id":"a","function":{"name":"mcp__s__one","arguments":"{}"}}]}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"id":"b","function":{"name":"mcp__s__two","arguments":"{\"x\":1}"}}]}}]}"#,
        ]);
        let names: Vec<&str> = response
            .tool_calls
            .iter()
            .map(|call| call.tool_name.as_str())
            .collect();
        assert_eq!(names, ["mcp__s__one", "mcp__s__two"]);
        assert_eq!(response.tool_calls[1].input, json!({"x": 1}));
    }

    #[test]
    fn missing_ids_and_odd_arguments_are_tolerated() {
        let (_, response) = feed(&[
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"name":"mcp__s__one"}}]}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":1,"id":"x","function":{"name":"mcp__s__two","arguments":"not json"}}]}}]}"#,
        ]);
        assert_eq!(response.tool_calls[0].id, "call_0");
        assert_eq!(response.tool_calls[0].input, json!({}));
        assert_eq!(response.tool_calls[1].input, json!("not json"));
    }

    #[test]
    fn reasoning_is_bracketed_and_kept_out_of_text() {
        let (events, response) = feed(&[
            r#"data: {"choices":[{"delta":{"reasoning_content":"thinking"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"Answer"}}]}"#,
        ]);
        assert_eq!(
            events,
            vec![
                TurnEvent::ReasoningStart,
                TurnEvent::ReasoningDelta("thinking".to_string()),
                TurnEvent::ReasoningEnd,
                TurnEvent::TextStart,
                TurnEvent::TextDelta("Answer".to_string()),
                TurnEvent::TextEnd,
            ]
        );
        assert_eq!(response.messages[0].text(), "Answer");
    }

    #[test]
    fn history_maps_to_wire_messages() {
        let call = ToolCallRequest::new("call-1", "mcp__files__read", json!({"path": "a"}));
        let history = vec![
            Message::user("read a"),
            Message::assistant(vec![ContentPart::ToolCall(call.clone())]),
            Message::tool_result(ToolCallResult {
                tool_call_id: "call-1".to_string(),
                tool_name: call.tool_name.clone(),
                output: ToolOutput::Structured(json!({"ok": true})),
            }),
            Message::assistant(vec![ContentPart::text("done")]),
        ];

        let api = history_to_api_messages(&history);
        assert_eq!(api.len(), 4);
        assert_eq!(api[0].role, "user");
        assert_eq!(api[1].content, None);
        let wire_calls = api[1].tool_calls.as_ref().expect("tool calls");
        assert_eq!(wire_calls[0].function.arguments, r#"{"path":"a"}"#);
        assert_eq!(api[2].role, "tool");
        assert_eq!(api[2].tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(api[2].content.as_deref(), Some(r#"{"ok":true}"#));
        assert_eq!(api[3].content.as_deref(), Some("done"));
    }

    #[test]
    fn catalog_becomes_function_tools() {
        assert!(catalog_to_tools(&ToolCatalog::new()).is_none());

        let mut catalog = ToolCatalog::new();
        catalog.insert(
            "mcp__files__read".to_string(),
            CatalogEntry {
                description: Some("Read a file".to_string()),
                input_schema: json!({"type": "object", "properties": {"path": {"type": "string"}}}),
            },
        );
        catalog.insert(
            "mcp__files__list".to_string(),
            CatalogEntry {
                description: None,
                input_schema: Value::Null,
            },
        );

        let tools = catalog_to_tools(&catalog).expect("tools");
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].function.name, "mcp__files__list");
        assert_eq!(tools[0].function.parameters, json!({"type": "object"}));
        assert_eq!(tools[1].kind, "function");
    }

    #[test]
    fn format_api_error_prettifies_json_with_summary() {
        let raw = r#"{"error":{"message":"model overloaded","type":"invalid_request_error"}}"#;
        let formatted = format_api_error(raw);

        let expected = r#"API Error: model overloaded
```json
{
  "error": {
    "message": "model overloaded",
    "type": "invalid_request_error"
  }
}
```"#;
        assert_eq!(formatted, expected);
    }

    #[test]
    fn format_api_error_handles_xml_and_plaintext() {
        assert_eq!(
            format_api_error("<error>bad</error>"),
            "API Error:\n```xml\n<error>bad</error>\n```"
        );
        assert_eq!(format_api_error("api failure"), "API Error:\n```\napi failure\n```");
        assert_eq!(format_api_error("  "), "API Error:\n```\n<empty>\n```");
    }

    #[tokio::test]
    async fn cancelled_turn_reports_cancellation() {
        let provider = ChatStreamProvider::new(ProviderSession {
            provider_id: "custom".to_string(),
            display_name: "Custom".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            model: "m".to_string(),
        })
        .expect("provider");
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        let mut turn = provider.start_turn(&[Message::user("hi")], &ToolCatalog::new(), cancel_token);
        while turn.next_event().await.is_some() {}
        assert!(matches!(turn.finish().await, Err(ProviderError::Cancelled)));
    }
}

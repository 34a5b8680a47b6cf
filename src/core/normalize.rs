//! Normalization of raw MCP `tools/call` results.
//!
//! Servers answer tool calls in several shapes: an explicit
//! `structuredContent` field, a list of typed content blocks, or (for older
//! or non-conforming servers) a bare scalar. [`normalize`] maps every shape
//! onto a single [`ToolOutput`] using a fixed precedence:
//!
//! 1. a failed call becomes [`ToolOutput::Failure`] with `"Tool call failed"`;
//! 2. an explicit structured field wins over any content;
//! 3. for content lists, the first `text` block is promoted to structured
//!    data when it parses as JSON, and kept as text otherwise;
//! 4. scalar content is kept as text, serializing non-string values.

use serde_json::{Map, Value};

use crate::core::message::ToolOutput;

/// Raw outcome of invoking a tool on a server, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawToolResult {
    /// The call could not be completed (unknown tool, transport error,
    /// unreadable response).
    Failed { reason: String },
    Completed {
        structured_content: Option<Value>,
        content: RawContent,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawContent {
    Parts(Vec<Value>),
    Scalar(Value),
}

impl RawToolResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        RawToolResult::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RawToolResult::Failed { .. })
    }

    /// Builds a raw result from the `result` member of a `tools/call` response.
    ///
    /// Anything that is not a JSON object is treated as scalar content so the
    /// normalizer can still fall back to a textual rendering.
    pub fn from_response_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return RawToolResult::Completed {
                structured_content: None,
                content: RawContent::Scalar(value),
            };
        };

        let structured_content = take_non_null(&mut map, "structuredContent");
        let content = match map.remove("content") {
            Some(Value::Array(parts)) => RawContent::Parts(parts),
            Some(other) => RawContent::Scalar(other),
            None => RawContent::Scalar(Value::Object(map)),
        };

        RawToolResult::Completed {
            structured_content,
            content,
        }
    }
}

fn take_non_null(map: &mut Map<String, Value>, key: &str) -> Option<Value> {
    map.remove(key).filter(|value| !value.is_null())
}

/// Maps a raw tool result onto the canonical output shape. Pure.
pub fn normalize(raw: &RawToolResult) -> ToolOutput {
    let (structured_content, content) = match raw {
        RawToolResult::Failed { .. } => return ToolOutput::failure(),
        RawToolResult::Completed {
            structured_content,
            content,
        } => (structured_content, content),
    };

    if let Some(structured) = structured_content {
        return ToolOutput::Structured(structured.clone());
    }

    match content {
        RawContent::Parts(parts) => normalize_parts(parts),
        RawContent::Scalar(Value::String(text)) => ToolOutput::Text(text.clone()),
        RawContent::Scalar(other) => ToolOutput::Text(other.to_string()),
    }
}

fn normalize_parts(parts: &[Value]) -> ToolOutput {
    let Some(text) = first_text_part(parts) else {
        return ToolOutput::Text(Value::Array(parts.to_vec()).to_string());
    };

    match serde_json::from_str::<Value>(text) {
        Ok(parsed) => ToolOutput::Structured(parsed),
        Err(_) => ToolOutput::Text(text.to_string()),
    }
}

fn first_text_part(parts: &[Value]) -> Option<&str> {
    parts
        .iter()
        .find(|part| part.get("type").and_then(Value::as_str) == Some("text"))
        .map(|part| part.get("text").and_then(Value::as_str).unwrap_or_default())
}

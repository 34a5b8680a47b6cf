use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload sent to the model whenever a tool call could not be completed.
pub const TOOL_CALL_FAILED: &str = "Tool call failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-generated identifier, unique within the conversation.
    pub id: String,
    /// Qualified tool name (`mcp__<server>__<tool>`).
    pub tool_name: String,
    pub input: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            input,
        }
    }
}

/// Canonical tool output shape handed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ToolOutput {
    Structured(Value),
    Text(String),
    Failure(String),
}

impl ToolOutput {
    pub fn failure() -> Self {
        ToolOutput::Failure(TOOL_CALL_FAILED.to_string())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ToolOutput::Failure(_))
    }

    /// Text form used on the wire and in the transcript log.
    pub fn to_model_text(&self) -> String {
        match self {
            ToolOutput::Structured(value) => value.to_string(),
            ToolOutput::Text(text) | ToolOutput::Failure(text) => text.clone(),
        }
    }

    /// Text form used for terminal display; structured values are pretty printed.
    pub fn to_display_text(&self) -> String {
        match self {
            ToolOutput::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            ToolOutput::Text(text) | ToolOutput::Failure(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: ToolOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolCall(ToolCallRequest),
    ToolResult(ToolCallResult),
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCallRequest> {
        match self {
            ContentPart::ToolCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolCallResult> {
        match self {
            ContentPart::ToolResult(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self { role, content }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentPart::text(text)])
    }

    pub fn assistant(content: Vec<ContentPart>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool_result(result: ToolCallResult) -> Self {
        Self::new(Role::Tool, vec![ContentPart::ToolResult(result)])
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    pub fn is_tool(&self) -> bool {
        self.role == Role::Tool
    }

    /// Concatenation of all text parts, separated by blank lines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallRequest> {
        self.content.iter().filter_map(ContentPart::as_tool_call)
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ToolCallResult> {
        self.content.iter().filter_map(ContentPart::as_tool_result)
    }
}

//! Line-oriented rendering of the conversation.
//!
//! Assistant text streams in as it arrives; tool calls and their results
//! are printed once finalized.

use std::io::Write;

use serde_json::Value;
use tracing::debug;

use crate::core::message::{Message, Role, ToolCallRequest, ToolCallResult, ToolOutput};
use crate::core::orchestrator::TranscriptObserver;
use crate::core::stream_decoder::LiveTurn;

const ASSISTANT_MARKER: &str = "● ";
const RESULT_MARKER: &str = "  └── ";
const RESULT_INDENT: &str = "      ";

pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    /// Bytes of the current live segment already written.
    segment_written: usize,
    streamed: bool,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            segment_written: 0,
            streamed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush());
        if let Err(err) = result {
            debug!(error = %err, "Failed to write to terminal");
        }
    }
}

impl<W: Write + Send> TranscriptObserver for TerminalRenderer<W> {
    fn on_message(&mut self, message: &Message) {
        // The prompt already shows what the user typed.
        if message.role != Role::Assistant {
            return;
        }

        let mut block = String::new();
        if self.streamed {
            block.push('\n');
        } else {
            let text = message.text();
            if !text.trim().is_empty() {
                block.push_str(ASSISTANT_MARKER);
                block.push_str(text.trim_end());
                block.push('\n');
            }
        }
        for call in message.tool_calls() {
            block.push_str(ASSISTANT_MARKER);
            block.push_str(&format_tool_call(call));
            block.push('\n');
        }
        self.streamed = false;
        self.segment_written = 0;
        self.write(&block);
    }

    fn on_tool_result(&mut self, _request: &ToolCallRequest, result: &ToolCallResult) {
        let block = format_tool_result(&result.output);
        self.write(&block);
    }

    fn on_live_turn(&mut self, live: LiveTurn<'_>) {
        let text = live.text;
        if text.is_empty() {
            self.segment_written = 0;
            return;
        }
        if text.len() <= self.segment_written {
            return;
        }

        let mut chunk = String::new();
        if !self.streamed {
            chunk.push_str(ASSISTANT_MARKER);
            self.streamed = true;
        } else if self.segment_written == 0 {
            chunk.push('\n');
        }
        chunk.push_str(&text[self.segment_written..]);
        self.segment_written = text.len();
        self.write(&chunk);
    }
}

/// `name (key: value, ...)`; string values are shown without quotes.
pub fn format_tool_call(call: &ToolCallRequest) -> String {
    let arguments = match &call.input {
        Value::Object(map) if map.is_empty() => String::new(),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::String(text) => format!("{key}: {text}"),
                other => format!("{key}: {other}"),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    };
    format!("{} ({arguments})", call.tool_name)
}

pub fn format_tool_result(output: &ToolOutput) -> String {
    let text = output.to_display_text();
    let mut lines = text.lines();
    let mut block = String::new();
    block.push_str(RESULT_MARKER);
    block.push_str(lines.next().unwrap_or(""));
    block.push('\n');
    for line in lines {
        block.push_str(RESULT_INDENT);
        block.push_str(line);
        block.push('\n');
    }
    block
}

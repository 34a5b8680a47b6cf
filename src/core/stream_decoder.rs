//! Accumulate-and-flush decoding of one model turn.
//!
//! Text segments open on `TextStart`, grow on every `TextDelta` and freeze on
//! `TextEnd`. Tool inputs accumulate per call id from `ToolInputStart` /
//! `ToolInputDelta` until the provider emits the finalized `ToolCall`.
//! Reasoning events are observed and dropped.

use std::collections::HashMap;

use crate::core::message::ToolCallRequest;
use crate::core::provider::TurnEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecoderState {
    #[default]
    Idle,
    AccumulatingText,
}

/// Tool input still being streamed for one call id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingToolInput {
    pub tool_name: String,
    pub raw_input: String,
}

/// Text and tool calls produced by one model turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnResult {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Read-only view of an in-progress turn, handed to display observers.
#[derive(Debug, Clone, Copy)]
pub struct LiveTurn<'a> {
    pub text: &'a str,
    pub tool_calls: &'a [ToolCallRequest],
    pub pending_inputs: usize,
}

#[derive(Debug, Default)]
pub struct StreamDecoder {
    state: DecoderState,
    live_text: String,
    segments: Vec<String>,
    pending: HashMap<String, PendingToolInput>,
    tool_calls: Vec<ToolCallRequest>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Applies one event. Returns `true` when externally visible state changed.
    pub fn apply(&mut self, event: TurnEvent) -> bool {
        match event {
            TurnEvent::TextStart => {
                self.flush_text();
                self.state = DecoderState::AccumulatingText;
                true
            }
            TurnEvent::TextDelta(delta) => {
                self.state = DecoderState::AccumulatingText;
                self.live_text.push_str(&delta);
                !delta.is_empty()
            }
            TurnEvent::TextEnd => {
                self.flush_text();
                true
            }
            TurnEvent::ToolInputStart { id, tool_name } => {
                self.pending.insert(
                    id,
                    PendingToolInput {
                        tool_name,
                        raw_input: String::new(),
                    },
                );
                true
            }
            TurnEvent::ToolInputDelta { id, delta } => {
                self.pending.entry(id).or_default().raw_input.push_str(&delta);
                false
            }
            TurnEvent::ToolCall(call) => {
                self.pending.remove(&call.id);
                self.tool_calls.push(call);
                true
            }
            TurnEvent::ReasoningStart | TurnEvent::ReasoningDelta(_) | TurnEvent::ReasoningEnd => {
                false
            }
        }
    }

    fn flush_text(&mut self) {
        if self.state() == DecoderState::AccumulatingText {
            self.segments.push(std::mem::take(&mut self.live_text));
        }
        self.state = DecoderState::Idle;
    }

    /// Text of the segment currently streaming; empty between segments.
    pub fn live_text(&self) -> &str {
        &self.live_text
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        &self.tool_calls
    }

    pub fn pending_input(&self, id: &str) -> Option<&PendingToolInput> {
        self.pending.get(id)
    }

    pub fn live(&self) -> LiveTurn<'_> {
        LiveTurn {
            text: &self.live_text,
            tool_calls: &self.tool_calls,
            pending_inputs: self.pending.len(),
        }
    }

    /// Closes any open text segment and returns the turn's output.
    pub fn finish(mut self) -> TurnResult {
        self.flush_text();
        TurnResult {
            text: self.segments.concat(),
            tool_calls: self.tool_calls,
        }
    }
}

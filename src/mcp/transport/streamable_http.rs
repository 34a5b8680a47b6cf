use futures_util::StreamExt;
use memchr::memchr;
use rust_mcp_schema::schema_utils::ServerMessage;
use tracing::debug;

/// Splits an event-stream body into trimmed, non-empty lines across chunk
/// boundaries.
#[derive(Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        self.drain_lines(false)
    }

    pub fn finish(&mut self) -> Vec<String> {
        self.drain_lines(true)
    }

    fn drain_lines(&mut self, flush: bool) -> Vec<String> {
        let mut lines = Vec::new();
        let mut start = 0;

        while let Some(relative_pos) = memchr(b'\n', &self.buffer[start..]) {
            let newline_index = start + relative_pos;
            push_trimmed(&mut lines, &self.buffer[start..newline_index]);
            start = newline_index + 1;
        }

        if flush {
            push_trimmed(&mut lines, &self.buffer[start..]);
            self.buffer.clear();
        } else if start > 0 {
            self.buffer.drain(..start);
        }

        lines
    }
}

fn push_trimmed(lines: &mut Vec<String>, bytes: &[u8]) {
    if let Ok(text) = std::str::from_utf8(bytes) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

pub fn sse_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Reads an event-stream response until the first response or error message.
///
/// Server-initiated requests and notifications that precede the reply are
/// logged and skipped.
pub async fn next_sse_server_message(
    server_id: &str,
    response: reqwest::Response,
) -> Result<ServerMessage, String> {
    let mut stream = response.bytes_stream();
    let mut buffer = SseLineBuffer::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| err.to_string())?;
        for line in buffer.push(&chunk) {
            if let Some(message) = reply_from_line(server_id, &line)? {
                return Ok(message);
            }
        }
    }

    for line in buffer.finish() {
        if let Some(message) = reply_from_line(server_id, &line)? {
            return Ok(message);
        }
    }

    Err("Empty event-stream response.".to_string())
}

fn reply_from_line(server_id: &str, line: &str) -> Result<Option<ServerMessage>, String> {
    let Some(message) = decode_sse_line(line)? else {
        return Ok(None);
    };
    if matches!(
        message,
        ServerMessage::Response(_) | ServerMessage::Error(_)
    ) {
        return Ok(Some(message));
    }
    if let ServerMessage::Request(request) = &message {
        debug!(
            server_id = %server_id,
            method = %request.method(),
            "Ignoring MCP server request on HTTP response stream"
        );
    } else {
        debug!(server_id = %server_id, "Received MCP HTTP notification");
    }
    Ok(None)
}

fn decode_sse_line(line: &str) -> Result<Option<ServerMessage>, String> {
    let Some(payload) = sse_data_payload(line) else {
        return Ok(None);
    };

    if payload.is_empty() {
        return Ok(None);
    }

    serde_json::from_str::<ServerMessage>(payload)
        .map(Some)
        .map_err(|err| err.to_string())
}

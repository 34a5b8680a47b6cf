use crate::core::message::{Message, Role};
use crate::core::orchestrator::TranscriptObserver;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Plain-text transcript of the conversation, appended as messages arrive.
pub struct TranscriptLog {
    file_path: PathBuf,
}

impl TranscriptLog {
    /// Opens (or creates) the log and writes a session marker.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let file_path = path.into();
        let log = TranscriptLog { file_path };
        log.log_message(&format!(
            "## Session started {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ))?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn log_message(&self, content: &str) -> std::io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between messages, as on screen.
        writeln!(writer)?;
        writer.flush()
    }
}

/// Renders a message for the transcript; `None` when there is nothing to write.
fn format_for_log(message: &Message) -> Option<String> {
    let mut blocks = Vec::new();
    match message.role {
        Role::User => blocks.push(format!("You: {}", message.text())),
        Role::Assistant => {
            let text = message.text();
            if !text.trim().is_empty() {
                blocks.push(text);
            }
            for call in message.tool_calls() {
                blocks.push(format!("## Tool call {} [{}]: {}", call.tool_name, call.id, call.input));
            }
        }
        Role::Tool => {
            for result in message.tool_results() {
                blocks.push(format!(
                    "## Tool result {} [{}]\n{}",
                    result.tool_name,
                    result.tool_call_id,
                    result.output.to_model_text()
                ));
            }
        }
    }
    (!blocks.is_empty()).then(|| blocks.join("\n\n"))
}

impl TranscriptObserver for TranscriptLog {
    fn on_message(&mut self, message: &Message) {
        let Some(content) = format_for_log(message) else {
            return;
        };
        if let Err(err) = self.log_message(&content) {
            warn!(path = %self.file_path.display(), error = %err, "Failed to write transcript log");
        }
    }
}

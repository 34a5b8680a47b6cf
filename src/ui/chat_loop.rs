//! Read-eval-print loop driving an [`Orchestrator`] from standard input.

use std::error::Error;
use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::commands::{help_text, process_input, CommandResult};
use crate::core::orchestrator::{Orchestrator, OrchestratorError};
use crate::mcp::registry::ToolCatalog;

const PROMPT: &str = "> ";

enum SubmitOutcome {
    Done,
    Interrupted,
}

pub async fn run_chat(mut orchestrator: Orchestrator) -> Result<(), Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match process_input(&line) {
            CommandResult::Continue => {}
            CommandResult::Exit => break,
            CommandResult::ShowHelp => println!("{}", help_text()),
            CommandResult::ListTools => print!("{}", format_tool_list(orchestrator.registry().catalog())),
            CommandResult::RefreshTools => match orchestrator.rediscover().await {
                Ok(()) => println!("{} tools available.", orchestrator.registry().len()),
                Err(err) => eprintln!("⚠️  {err}"),
            },
            CommandResult::ProcessAsMessage(text) => {
                if let SubmitOutcome::Interrupted = submit(&mut orchestrator, &text).await {
                    break;
                }
            }
        }
    }

    info!("Closing MCP servers");
    orchestrator.close().await;
    Ok(())
}

/// Runs one submission; Ctrl-C cancels it and ends the session.
async fn submit(orchestrator: &mut Orchestrator, text: &str) -> SubmitOutcome {
    let cancel_token = CancellationToken::new();
    let result = {
        let submission = orchestrator.submit(text, &cancel_token);
        tokio::pin!(submission);
        tokio::select! {
            result = &mut submission => result,
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupt received during turn");
                cancel_token.cancel();
                submission.await
            }
        }
    };

    match result {
        Ok(()) => SubmitOutcome::Done,
        Err(OrchestratorError::Cancelled) => {
            println!("\nInterrupted.");
            SubmitOutcome::Interrupted
        }
        Err(err @ OrchestratorError::IterationLimit { .. }) => {
            eprintln!("⚠️  {err}");
            SubmitOutcome::Done
        }
        Err(err) => {
            eprintln!("❌ {err}");
            SubmitOutcome::Done
        }
    }
}

fn print_prompt() {
    print!("{PROMPT}");
    let _ = std::io::stdout().flush();
}

pub fn format_tool_list(catalog: &ToolCatalog) -> String {
    if catalog.is_empty() {
        return "No tools available.\n".to_string();
    }
    let mut listing = String::new();
    for (name, entry) in catalog {
        match entry.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => {
                let summary = description.lines().next().unwrap_or(description);
                listing.push_str(&format!("  {name}: {summary}\n"));
            }
            _ => listing.push_str(&format!("  {name}\n")),
        }
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::registry::CatalogEntry;
    use serde_json::json;

    #[test]
    fn tool_list_shows_first_description_line() {
        let mut catalog = ToolCatalog::new();
        catalog.insert(
            "mcp__files__read".to_string(),
            CatalogEntry {
                description: Some("Read a file.\nReturns the contents.".to_string()),
                input_schema: json!({"type": "object"}),
            },
        );
        catalog.insert(
            "mcp__files__stat".to_string(),
            CatalogEntry {
                description: None,
                input_schema: json!({"type": "object"}),
            },
        );

        assert_eq!(
            format_tool_list(&catalog),
            "  mcp__files__read: Read a file.\n  mcp__files__stat\n"
        );
    }

    #[test]
    fn empty_tool_list() {
        assert_eq!(format_tool_list(&ToolCatalog::new()), "No tools available.\n");
    }
}

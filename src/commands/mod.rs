//! Slash commands typed at the chat prompt.

mod registry;

pub use registry::{all_commands, CommandInvocation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Nothing to do; read the next line.
    Continue,
    ProcessAsMessage(String),
    ShowHelp,
    ListTools,
    RefreshTools,
    Exit,
}

pub fn process_input(input: &str) -> CommandResult {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return CommandResult::Continue;
    }
    if !trimmed.starts_with('/') {
        return CommandResult::ProcessAsMessage(trimmed.to_string());
    }

    let mut parts = trimmed[1..].splitn(2, ' ');
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(trimmed.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    match registry::find_command(command_name) {
        Some(command) => (command.handler)(CommandInvocation {
            input: trimmed,
            args,
        }),
        None => CommandResult::ProcessAsMessage(trimmed.to_string()),
    }
}

pub fn help_text() -> String {
    let mut help = String::from("Commands:\n");
    for command in all_commands() {
        help.push_str(&format!("  {:<10} {}\n", command.usage, command.help));
    }
    help.push_str("  Ctrl-C     Interrupt the current reply and quit.");
    help
}

pub(super) fn handle_help(_invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::ShowHelp
}

pub(super) fn handle_tools(_invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::ListTools
}

pub(super) fn handle_refresh(_invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::RefreshTools
}

pub(super) fn handle_exit(_invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Exit
}

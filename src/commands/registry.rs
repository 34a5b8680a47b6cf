use super::CommandResult;

pub type CommandHandler = fn(CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub input: &'a str,
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "tools",
        usage: "/tools",
        help: "List the tools the model can call.",
        handler: super::handle_tools,
    },
    Command {
        name: "refresh",
        usage: "/refresh",
        help: "Ask every MCP server for its tools again.",
        handler: super::handle_refresh,
    },
    Command {
        name: "exit",
        usage: "/exit",
        help: "Close MCP servers and quit.",
        handler: super::handle_exit,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Same as /exit.",
        handler: super::handle_exit,
    },
];

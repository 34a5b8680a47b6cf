use std::path::Path;

const MAX_LISTED_SERVERS: usize = 3;

/// Banner shown once at startup.
pub fn welcome_banner(model: &str, working_dir: &Path, server_ids: &[&str]) -> String {
    let servers = if server_ids.is_empty() {
        "none".to_string()
    } else {
        let mut listed = server_ids
            .iter()
            .take(MAX_LISTED_SERVERS)
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        if server_ids.len() > MAX_LISTED_SERVERS {
            listed.push_str(&format!(" (+{} more)", server_ids.len() - MAX_LISTED_SERVERS));
        }
        listed
    };

    format!(
        "✻ Welcome to chat-mcp v{version}\n\
         \n  model:       {model}\
         \n  cwd:         {cwd}\
         \n  MCP servers: {servers}\n\
         \nTips:\
         \n  /tools shows the tools the model can call\
         \n  /help lists every command\
         \n  Ctrl-C interrupts a reply and quits\n",
        version = env!("CARGO_PKG_VERSION"),
        cwd = working_dir.display(),
    )
}

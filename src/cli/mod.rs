//! Command-line parsing and startup wiring.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::core::chat_stream::ChatStreamProvider;
use crate::core::config::config_json::CONFIG_JSON_FILE_NAME;
use crate::core::config::mcp_json::MCP_JSON_FILE_NAME;
use crate::core::config::Config;
use crate::core::orchestrator::Orchestrator;
use crate::core::providers::resolve_env_session;
use crate::mcp::client::{connect_all, ToolServer};
use crate::ui::chat_loop::run_chat;
use crate::ui::renderer::TerminalRenderer;
use crate::ui::welcome::welcome_banner;
use crate::utils::logging::TranscriptLog;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit:  ",
    env!("VERGEN_GIT_DESCRIBE"),
    "\nbuilt:   ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    "\ntarget:  ",
    env!("VERGEN_CARGO_TARGET_TRIPLE"),
    "\nrustc:   ",
    env!("VERGEN_RUSTC_SEMVER"),
);

#[derive(Parser, Debug)]
#[command(name = "chat-mcp", version, long_version = LONG_VERSION)]
#[command(about = "Chat with a language model that can call tools on MCP servers")]
#[command(
    long_about = "chat-mcp is a terminal chat client. The model can call tools exposed by the \
MCP servers listed in the configuration file, and tool results are fed back to it until it \
produces a final answer.\n\n\
Configuration:\n\
  config.toml       [provider] and [[mcp_servers]] tables (see --config)\n\
  mcp.json          Optional server list in the working directory, merged at startup\n\n\
Environment Variables:\n\
  OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, OPENROUTER_API_KEY\n\
                    Provider credentials when no api_key is configured\n\
  RUST_LOG          Log filter; overrides -v\n\n\
Commands:\n\
  /tools            List available tools\n\
  /refresh          Re-discover tools on every server\n\
  /help             Show commands\n\
  /exit, /quit      Close servers and quit"
)]
pub struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// MCP server list in mcp.json format
    #[arg(long, value_name = "FILE")]
    pub mcp_config: Option<PathBuf>,

    /// Provider id: openai, anthropic, google, openrouter or custom
    #[arg(short, long, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Model to chat with
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Increase diagnostic output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Append the conversation transcript to this file
    #[arg(short = 'l', long, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose, args.log_file.as_deref())?;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async_main(args));
    // A pending stdin read lives on the blocking pool and never returns on its own.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

fn verbosity_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| verbosity_filter(verbose));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<Config, Box<dyn Error>> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::get_config_path()?,
    };
    let mcp_json_path = args
        .mcp_config
        .clone()
        .unwrap_or_else(|| PathBuf::from(MCP_JSON_FILE_NAME));
    debug!(
        config = %config_path.display(),
        mcp_json = %mcp_json_path.display(),
        "Loading configuration"
    );

    let config_json_path = PathBuf::from(CONFIG_JSON_FILE_NAME);
    let mut config = Config::load_merged(&config_path, &mcp_json_path, &config_json_path)?;
    if let Some(provider) = &args.provider {
        config.provider.id = Some(provider.clone());
    }
    if let Some(model) = &args.model {
        config.provider.model = Some(model.clone());
    }
    Ok(config)
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args)?;
    let session = resolve_env_session(&config.provider)?;
    info!(provider = %session.provider_id, model = %session.model, "Using model");

    let provider = Arc::new(ChatStreamProvider::new(session)?);
    let mut orchestrator =
        Orchestrator::new(provider).with_max_iterations(config.max_tool_iterations());

    let connections = connect_all(&config.mcp_servers).await?;
    orchestrator
        .attach_all(
            connections
                .into_iter()
                .map(|connection| Box::new(connection) as Box<dyn ToolServer>)
                .collect(),
        )
        .await?;

    orchestrator.add_observer(Box::new(TerminalRenderer::new(std::io::stdout())));
    if let Some(path) = &args.log {
        let transcript = TranscriptLog::open(path)?;
        info!(path = %transcript.path().display(), "Writing transcript");
        orchestrator.add_observer(Box::new(transcript));
    }

    let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let server_ids: Vec<&str> = orchestrator.server_ids().collect();
    println!(
        "{}",
        welcome_banner(orchestrator.model_id(), &working_dir, &server_ids)
    );

    run_chat(orchestrator).await
}

#[cfg(test)]
mod tests;

//! chat-mcp is a terminal chat client whose model can call tools served over
//! the Model Context Protocol.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation model, provider resolution, streaming
//!   decode and the tool-calling orchestrator.
//! - [`mcp`] connects to MCP servers over stdio or streamable HTTP and keeps
//!   the registry of tools they expose.
//! - [`ui`] renders the transcript to the terminal and runs the input loop.
//! - [`commands`] parses the slash commands accepted at the prompt.
//! - [`api`] defines the chat completion payloads sent to providers.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`], which
//! loads configuration, connects servers and hands control to
//! [`ui::chat_loop`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod mcp;
pub mod ui;
pub mod utils;

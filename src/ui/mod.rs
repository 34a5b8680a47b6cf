//! Terminal front end.
//!
//! - [`chat_loop`]: reads lines from stdin, dispatches [`crate::commands`]
//!   and submits everything else to the [`crate::core::orchestrator`].
//! - [`renderer`]: prints the conversation as the orchestrator appends it.
//! - [`welcome`]: the startup banner.

pub mod chat_loop;
pub mod renderer;
pub mod welcome;

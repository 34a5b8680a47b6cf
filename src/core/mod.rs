pub mod builtin_providers;
pub mod chat_stream;
pub mod config;
pub mod message;
pub mod normalize;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod stream_decoder;

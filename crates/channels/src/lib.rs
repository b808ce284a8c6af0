//! Chat channel implementations for mnemo.
//!
//! - **CLI**: interactive terminal chat (stdin/stdout)
//! - **Discord**: REST outbound, inbound events injected by the host

pub mod cli;
pub mod discord;

pub use cli::CliChannel;
pub use discord::{DiscordChannel, DiscordConfig};

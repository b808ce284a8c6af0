//! `mnemo chat`: talk to the agent in the terminal.

use std::path::Path;
use std::sync::Arc;

use mnemo_channels::CliChannel;
use mnemo_core::channel::Channel;

use crate::bootstrap;

/// Agent ID used for the terminal session.
const LOCAL_AGENT_ID: &str = "mnemo_local";

pub async fn run(config_path: &Path, username: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = bootstrap::load_config(config_path)?;

    let channel = Arc::new(CliChannel::with_username(&username));
    let session = bootstrap::session(&config, channel.clone(), LOCAL_AGENT_ID).await?;

    println!();
    println!("  mnemo: interactive chat");
    println!();
    println!("  Model:     {}", config.model);
    println!("  Memory:    {:?} ({})", config.memory.backend, config.memory.path.display());
    println!("  Tools:     {}", if config.session.tools_enabled { "on" } else { "off" });
    println!("  You are:   {username}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let inbound = channel.start().await.map_err(|e| format!("Channel error: {e}"))?;
    tokio::select! {
        result = session.run(inbound) => result?,
        _ = tokio::signal::ctrl_c() => {}
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

//! `mnemo run`: serve Discord.
//!
//! Replies, reactions and nickname changes go out over the REST API. The
//! gateway session belongs to a relay process connected over stdio:
//! - stdin: dispatch payloads, one JSON object per line, either the full
//!   `{"t": "MESSAGE_CREATE", "d": {...}}` envelope or the bare message object
//! - stdout: gateway commands (op-3 presence updates) for the relay to send,
//!   one JSON object per line
//!
//! Human-readable output goes to stderr so stdout stays machine-readable.

use std::path::Path;
use std::sync::Arc;

use mnemo_channels::{DiscordChannel, DiscordConfig};
use mnemo_core::channel::Channel;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bootstrap;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = bootstrap::load_config(config_path)?;

    let token = config
        .discord
        .bot_token
        .clone()
        .ok_or("No Discord bot token configured (set DISCORD_TOKEN or discord.bot_token)")?;
    let bot_user_id = config
        .discord
        .bot_user_id
        .clone()
        .ok_or("discord.bot_user_id is required to recognise the bot's own messages")?;

    let mut discord = DiscordConfig::new(token);
    discord.bot_user_id = Some(bot_user_id.clone());
    let (gateway_tx, gateway_rx) = mpsc::channel(16);
    let channel = Arc::new(DiscordChannel::new(discord).with_gateway_relay(gateway_tx));

    let inbound = channel.start().await?;
    if !channel.health_check().await? {
        warn!("Discord API did not accept the bot token; replies will fail");
    }

    let session = bootstrap::session(&config, channel.clone(), &bot_user_id)
        .await?
        .with_channel_filter(config.discord.channel_ids.clone());

    eprintln!("mnemo is serving Discord");
    eprintln!("  Model:    {}", config.model);
    if config.discord.channel_ids.is_empty() {
        eprintln!("  Channels: all");
    } else {
        eprintln!("  Channels: {}", config.discord.channel_ids.join(", "));
    }

    let relay = tokio::spawn(relay_stdin(channel.clone()));
    let commands = tokio::spawn(write_gateway_commands(gateway_rx, tokio::io::stdout()));

    tokio::select! {
        result = session.run(inbound) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    relay.abort();
    commands.abort();
    Ok(())
}

/// Write gateway commands for the relay, one JSON object per line.
async fn write_gateway_commands<W: AsyncWrite + Unpin>(
    mut rx: mpsc::Receiver<Value>,
    mut out: W,
) {
    while let Some(command) = rx.recv().await {
        let mut line = command.to_string();
        line.push('\n');
        if let Err(e) = out.write_all(line.as_bytes()).await {
            warn!(error = %e, "Failed to write gateway command");
            break;
        }
        if let Err(e) = out.flush().await {
            warn!(error = %e, "Failed to flush gateway command");
            break;
        }
    }
    debug!("Gateway command writer stopped");
}

/// Forward gateway payloads from stdin into the channel.
async fn relay_stdin(channel: Arc<DiscordChannel>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Event relay closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read event relay");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let event: Value = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Skipping malformed gateway event");
                continue;
            }
        };
        let Some(payload) = message_payload(&event) else {
            debug!("Skipping non-message gateway event");
            continue;
        };
        if let Err(e) = channel.inject_event(payload).await {
            warn!(error = %e, "Failed to inject gateway event");
        }
    }
}

/// The message object inside a dispatch envelope, or the value itself.
fn message_payload(event: &Value) -> Option<&Value> {
    match event.get("t").and_then(Value::as_str) {
        Some("MESSAGE_CREATE") => event.get("d"),
        Some(_) => None,
        None => Some(event),
    }
}

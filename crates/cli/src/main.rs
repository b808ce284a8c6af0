//! mnemo CLI: the main entry point.
//!
//! Commands:
//! - `onboard` : write a default config
//! - `run`     : serve a Discord channel (gateway events relayed on stdin)
//! - `chat`    : talk to the agent in the terminal
//! - `memory`  : show or reset the memory bank
//! - `status`  : show the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod bootstrap;
mod commands;

#[derive(Parser)]
#[command(
    name = "mnemo",
    about = "mnemo: a group-chat agent with long-term memory",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.mnemo/config.toml)
    #[arg(short, long, global = true, env = "MNEMO_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Serve the configured Discord channels
    Run,

    /// Chat with the agent in the terminal
    Chat {
        /// Name shown for your messages
        #[arg(short, long, default_value = "user")]
        username: String,
    },

    /// Inspect or reset the memory bank
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Show the effective configuration
    Status,
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Print the bank as JSON, or as the agent sees it with --rendered
    Show {
        #[arg(long)]
        rendered: bool,
    },

    /// Replace the bank with an empty one
    Reset {
        /// Skip the confirmation hint and reset immediately
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(|| mnemo_config::AppConfig::config_dir().join("config.toml"));

    match cli.command {
        Commands::Onboard => commands::onboard::run(&config_path).await?,
        Commands::Run => commands::run::run(&config_path).await?,
        Commands::Chat { username } => commands::chat::run(&config_path, username).await?,
        Commands::Memory { action } => match action {
            MemoryAction::Show { rendered } => {
                commands::memory::show(&config_path, rendered).await?
            }
            MemoryAction::Reset { confirm } => commands::memory::reset(&config_path, confirm).await?,
        },
        Commands::Status => commands::status::run(&config_path).await?,
    }

    Ok(())
}

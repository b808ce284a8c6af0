//! `mnemo status`: show the effective configuration.

use std::path::Path;

use crate::bootstrap;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = bootstrap::load_config(config_path)?;

    println!("mnemo status");
    println!("============");
    println!("  Config file:     {}", config_path.display());
    println!("  API URL:         {}", config.api_url);
    println!("  API key:         {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Model:           {}", config.model);
    println!("  Synthesis model: {}", config.synthesis_model());
    println!("  Temperature:     {}", config.temperature);
    println!("  Window:          {} messages", config.session.short_term_window);
    println!("  Synthesis every: {} turns", config.session.update_frequency);
    println!("  Tool depth:      {}", config.session.max_tool_depth);
    println!("  Reply timeout:   {}s", config.session.reply_timeout_secs);
    println!("  Memory backend:  {:?}", config.memory.backend);
    println!("  Memory file:     {}", config.memory.path.display());
    println!("  Discord token:   {}", if config.discord.bot_token.is_some() { "set" } else { "missing" });
    println!("  Admins:          {}", config.admin.allowed_users.len());
    println!(
        "  Attachments:     {}",
        config.attachments.upload_url.as_deref().unwrap_or("platform URLs")
    );

    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file, run `mnemo onboard` first");
    }
    Ok(())
}

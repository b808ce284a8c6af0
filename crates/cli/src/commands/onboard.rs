//! `mnemo onboard`: first-time setup.

use std::path::Path;

use mnemo_config::AppConfig;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("mnemo: first-time setup");
    println!("=======================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or delete it and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(config_path, AppConfig::default_toml())?;
    println!("Created config.toml at: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Set MNEMO_API_KEY (or add api_key to the config)");
    println!("  2. Run: mnemo chat");
    println!("  3. For Discord, set DISCORD_TOKEN and discord.bot_user_id, then: mnemo run\n");
    Ok(())
}

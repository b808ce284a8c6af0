//! `mnemo memory`: inspect or reset the memory bank.

use std::path::Path;

use crate::bootstrap;

pub async fn show(config_path: &Path, rendered: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = bootstrap::load_config(config_path)?;
    let store = bootstrap::memory_store(&config.memory).await?;
    let bank = store.load().await?;

    if bank.is_empty() {
        println!("The memory bank is empty.");
        return Ok(());
    }

    if rendered {
        println!("{}", bank.render());
    } else {
        println!("{}", bank.to_json_pretty()?);
    }
    Ok(())
}

pub async fn reset(config_path: &Path, confirm: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirm {
        println!("This replaces the memory bank with an empty one.");
        println!("Run with --confirm to proceed:");
        println!("  mnemo memory reset --confirm");
        return Ok(());
    }

    let config = bootstrap::load_config(config_path)?;
    let store = bootstrap::memory_store(&config.memory).await?;
    store.reset().await?;
    println!("Memory bank reset ({}).", store.backend_name());
    Ok(())
}

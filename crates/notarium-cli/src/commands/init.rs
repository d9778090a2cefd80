//! Init command

use crate::app::InitArgs;
use anyhow::Result;
use notarium_core::Config;
use std::path::Path;

pub fn run(args: InitArgs, config_path: &Path) -> Result<()> {
    if config_path.exists() && !args.force {
        println!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        );
        return Ok(());
    }

    let config = Config::default();
    config.save_to(config_path)?;

    println!("Wrote config to {}", config_path.display());
    println!("Vault path:  {}", config.vault_path.display());
    println!("Store path:  {}", config.store_path.display());
    println!();
    println!("Edit the file to point vault_path at your notes, then run `notarium ingest`.");
    Ok(())
}

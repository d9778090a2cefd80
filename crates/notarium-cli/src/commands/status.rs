//! Status command

use anyhow::Result;
use notarium_core::{Config, VectorStore};

pub fn run(config: &Config) -> Result<()> {
    let store = VectorStore::open(&config.store_path)?;

    println!("Vault:           {}", config.vault_path.display());
    println!("Store:           {}", config.store_path.display());
    println!();
    println!("Indexed files:   {}", store.file_count()?);
    println!("Chunks:          {}", store.chunk_count()?);
    println!();
    println!("Embedding model: {}", config.embedding.model);
    println!(
        "Chat backend:    {:?} ({})",
        config.chat.backend, config.chat.model
    );
    Ok(())
}

//! Ingest command

use anyhow::Result;
use notarium_core::{ingest_vault, Config, LazyEmbedder, MetadataExtractor, OllamaExtractor, VectorStore};

pub async fn run(config: &Config) -> Result<()> {
    let mut store = VectorStore::open(&config.store_path)?;
    let embedder = LazyEmbedder::new(config.embedding.clone());

    let extractor: Option<OllamaExtractor> = if config.ingest.auto_extract {
        Some(OllamaExtractor::new(
            &config.embedding.ollama_host,
            config.ingest.extractor_model_or(&config.chat.model),
            config.chat.timeout_secs,
        )?)
    } else {
        None
    };
    let extractor_ref = extractor.as_ref().map(|e| e as &dyn MetadataExtractor);

    println!("Ingesting vault at {}", config.vault_path.display());
    let report = ingest_vault(config, &mut store, &embedder, extractor_ref).await?;

    println!();
    println!("Files seen:      {}", report.files_seen);
    println!("Indexed:         {}", report.indexed);
    println!("Unchanged:       {}", report.skipped_unchanged);
    println!("Skipped status:  {}", report.skipped_status);
    if report.repaired > 0 {
        println!("Repaired:        {}", report.repaired);
    }
    if report.pruned > 0 {
        println!("Pruned:          {}", report.pruned);
    }

    if report.had_errors() {
        println!();
        println!("{} file(s) failed:", report.errors.len());
        for (path, message) in &report.errors {
            eprintln!("  {}: {}", path, message);
        }
    }

    Ok(())
}

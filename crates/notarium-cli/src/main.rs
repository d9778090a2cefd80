//! Notarium CLI
//!
//! RAG assistant for your markdown note vault.

use anyhow::Result;
use clap::Parser;
use notarium_core::{Config, LazyEmbedder, VectorStore};

mod app;
mod commands;

use app::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    // Logs go to stderr: stdout is user output, and under `mcp` it carries
    // the JSON-RPC frames.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_path);
    let config = Config::load_from(&config_path)?;

    match cli.command {
        Commands::Init(args) => commands::init::run(args, &config_path),
        Commands::Ingest => commands::ingest::run(&config).await,
        Commands::Search(args) => commands::search::run(args, &config).await,
        Commands::Chat(args) => commands::chat::run(args, &config).await,
        Commands::Status => commands::status::run(&config),
        Commands::Mcp => {
            let store = VectorStore::open(&config.store_path)?;
            let embedder = LazyEmbedder::new(config.embedding.clone());
            notarium_mcp::start_server(&store, &embedder).await
        }
    }
}

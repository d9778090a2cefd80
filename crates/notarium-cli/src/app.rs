//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "notarium")]
#[command(
    author,
    version,
    about = "RAG assistant and semantic search for your markdown vault"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (default: user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter config file
    Init(InitArgs),

    /// Scan the vault and index new or changed notes
    Ingest,

    /// Semantic search over indexed notes
    Search(SearchArgs),

    /// Interactive RAG chat over the vault
    Chat(ChatArgs),

    /// Show index status
    Status,

    /// Start MCP server on stdio
    Mcp,
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Search query
    pub query: Vec<String>,

    /// Maximum results
    #[arg(short, long, default_value = "5")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ChatArgs {
    /// Skip retrieval; talk to the model without vault context
    #[arg(long)]
    pub no_rag: bool,
}

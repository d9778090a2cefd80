//! Notarium Core Library
//!
//! Core functionality for the notarium markdown vault assistant.
//!
//! # Features
//! - Header-aware markdown chunking with recursive splitting and overlap
//! - Incremental vault ingestion with content fingerprinting
//! - Local SQLite vector store with cosine similarity search
//! - Asymmetric embeddings via Ollama (query/document prefixes)
//! - RAG chat sessions over local and hosted LLM backends
//! - Optional LLM-powered frontmatter repair

pub mod chat;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod index;
pub mod search;
pub mod store;
pub mod vault;

pub use chat::{
    build_backend, ChatBackend, ChatOptions, ChatSession, ConversationHistory, ConversationTurn,
    FragmentStream, Message, Reply, Role,
};
pub use config::{
    ChatBackendKind, ChatConfig, ChunkingConfig, Config, EmbeddingConfig, IngestConfig,
};
pub use embed::{EmbedMode, Embedder, LazyEmbedder, OllamaEmbedder};
pub use error::{NotariumError, Result};
pub use extract::{ExtractedMetadata, MetadataExtractor, NoopExtractor, OllamaExtractor};
pub use index::{chunk_markdown, ingest_vault, scan_vault, ChunkText, IngestReport, ScanResult};
pub use search::{format_context, format_context_summary, search_context, ContextChunk};
pub use store::{ChunkRecord, StoredChunk, VectorStore};
pub use vault::{Frontmatter, Status};

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "notarium";

/// Default store filename inside the config directory
pub const STORE_FILE_NAME: &str = "index.sqlite";

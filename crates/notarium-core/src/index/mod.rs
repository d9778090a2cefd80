//! Vault indexing: scanning, chunking, and the ingestion pipeline

pub mod chunker;
pub mod pipeline;
pub mod scanner;

pub use chunker::{chunk_markdown, ChunkText, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use pipeline::{ingest_vault, IngestReport};
pub use scanner::{scan_vault, ScanResult};

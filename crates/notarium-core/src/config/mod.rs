//! Configuration management
//!
//! Settings live in a YAML file under the user config directory; every field
//! can be overridden with a `NOTARIUM_*` environment variable. The core only
//! consumes these values, it never mutates them during a run.

use crate::error::{NotariumError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Root of the markdown vault
    #[serde(default = "default_vault_path")]
    pub vault_path: PathBuf,

    /// Location of the SQLite vector store
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Ollama host serving the embedding model
    pub ollama_host: String,

    /// Embedding model name
    pub model: String,

    /// Embedding dimensions (auto-detected on first use if not set)
    #[serde(default)]
    pub dimensions: Option<usize>,

    /// Request timeout in seconds
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            ollama_host: env_or("NOTARIUM_OLLAMA_HOST", "http://localhost:11434"),
            model: env_or("NOTARIUM_EMBEDDING_MODEL", "nomic-embed-text"),
            dimensions: std::env::var("NOTARIUM_EMBEDDING_DIMS")
                .ok()
                .and_then(|s| s.parse().ok()),
            timeout_secs: default_embed_timeout(),
        }
    }
}

/// Chunking parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Which chat backend a session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatBackendKind {
    #[default]
    Ollama,
    Claude,
    Gemini,
}

/// Chat session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub backend: ChatBackendKind,

    /// Model name for the selected backend
    pub model: String,

    /// Ollama host for the local backend
    pub ollama_host: String,

    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    #[serde(default)]
    pub google_api_key: Option<String>,

    /// How many context chunks to retrieve per turn
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,

    /// How many turns of history to keep
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Request timeout in seconds
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend: match std::env::var("NOTARIUM_CHAT_BACKEND").as_deref() {
                Ok("claude") => ChatBackendKind::Claude,
                Ok("gemini") => ChatBackendKind::Gemini,
                _ => ChatBackendKind::Ollama,
            },
            model: env_or("NOTARIUM_CHAT_MODEL", "llama3.2"),
            ollama_host: env_or("NOTARIUM_OLLAMA_HOST", "http://localhost:11434"),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            google_api_key: std::env::var("GOOGLE_API_KEY").ok(),
            context_limit: default_context_limit(),
            max_turns: default_max_turns(),
            timeout_secs: default_chat_timeout(),
        }
    }
}

/// Ingestion behavior toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Rewrite files with incomplete frontmatter during ingestion
    #[serde(default)]
    pub auto_repair: bool,

    /// Use the LLM extractor to fill repaired frontmatter fields
    #[serde(default)]
    pub auto_extract: bool,

    /// Model used for metadata extraction (falls back to the chat model)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor_model: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            auto_repair: false,
            auto_extract: false,
            extractor_model: std::env::var("NOTARIUM_EXTRACTOR_MODEL").ok(),
        }
    }
}

impl IngestConfig {
    /// Effective extraction model for this config
    pub fn extractor_model_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.extractor_model.as_deref().unwrap_or(fallback)
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn default_vault_path() -> PathBuf {
    std::env::var("NOTARIUM_VAULT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Notes")
        })
}

fn default_store_path() -> PathBuf {
    std::env::var("NOTARIUM_STORE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("notarium")
                .join("store.sqlite")
        })
}

fn default_chunk_size() -> usize {
    crate::index::chunker::DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    crate::index::chunker::DEFAULT_CHUNK_OVERLAP
}

fn default_context_limit() -> usize {
    5
}

fn default_max_turns() -> usize {
    10
}

fn default_embed_timeout() -> u64 {
    30
}

fn default_chat_timeout() -> u64 {
    120
}

impl Config {
    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notarium")
            .join("config.yaml")
    }

    /// Load config from the default path (missing file yields defaults)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&raw)
            .map_err(|e| NotariumError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Save config to the default path, creating parent directories
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::default_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chunking.chunk_size, 2000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.chat.context_limit, 5);
        assert_eq!(config.chat.max_turns, 10);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/notarium.yaml")).unwrap();
        assert_eq!(config.chunking.chunk_size, 2000);
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = Config::default();
        config.chunking.chunk_size = 1234;
        config.chat.backend = ChatBackendKind::Claude;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.chunking.chunk_size, 1234);
        assert_eq!(loaded.chat.backend, ChatBackendKind::Claude);
    }

    #[test]
    fn test_extractor_model_falls_back_to_chat_model() {
        let ingest = IngestConfig {
            extractor_model: None,
            ..Default::default()
        };
        assert_eq!(ingest.extractor_model_or("llama3.2"), "llama3.2");

        let ingest = IngestConfig {
            extractor_model: Some("qwen2.5".to_string()),
            ..Default::default()
        };
        assert_eq!(ingest.extractor_model_or("llama3.2"), "qwen2.5");
    }

    #[test]
    fn test_backend_kind_yaml_names() {
        let kind: ChatBackendKind = serde_yaml::from_str("gemini").unwrap();
        assert_eq!(kind, ChatBackendKind::Gemini);
    }
}

//! Embedding generation
//!
//! One sentence-embedding model behind an explicitly owned, lazily
//! initialized handle. The configured model uses asymmetric encoding:
//! queries and documents carry different prefixes, and mixing them up
//! silently misaligns the vector space, so every call site must state its
//! [`EmbedMode`].

use crate::config::EmbeddingConfig;
use crate::error::{NotariumError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

/// Which side of an asymmetric encoding a text belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    /// A user question ("search_query: ")
    Query,
    /// Indexed note content ("search_document: ")
    Document,
}

impl EmbedMode {
    pub fn prefix(&self) -> &'static str {
        match self {
            EmbedMode::Query => "search_query: ",
            EmbedMode::Document => "search_document: ",
        }
    }

    fn apply(&self, text: &str) -> String {
        format!("{}{}", self.prefix(), text)
    }
}

/// Embedding generation trait
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, mode: EmbedMode, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts
    async fn embed_batch(&self, mode: EmbedMode, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Model name
    fn model_name(&self) -> &str;
}

/// Embedder backed by an Ollama embedding endpoint
pub struct OllamaEmbedder {
    http_client: reqwest::Client,
    host: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    /// Connect to the embedding service and probe dimensions with a tiny
    /// request unless they are configured explicitly.
    pub async fn connect(config: &EmbeddingConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotariumError::EmbeddingUnavailable(e.to_string()))?;

        let mut embedder = Self {
            http_client,
            host: config.ollama_host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions.unwrap_or(0),
        };

        if embedder.dimensions == 0 {
            let probe = embedder.request(vec!["dimension probe".to_string()]).await?;
            embedder.dimensions = probe
                .first()
                .map(Vec::len)
                .filter(|&d| d > 0)
                .ok_or_else(|| {
                    NotariumError::EmbeddingUnavailable(format!(
                        "model {} returned no embedding for the dimension probe",
                        embedder.model
                    ))
                })?;
        }

        tracing::info!(
            model = %embedder.model,
            dimensions = embedder.dimensions,
            "embedding model ready"
        );
        Ok(embedder)
    }

    async fn request(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = input.len();
        let url = format!("{}/api/embed", self.host);
        let request = EmbedRequest {
            model: &self.model,
            input,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotariumError::EmbeddingUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotariumError::EmbeddingUnavailable(format!(
                "{} returned {}: {}",
                url, status, body
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| NotariumError::EmbeddingUnavailable(e.to_string()))?;

        if parsed.embeddings.len() != expected {
            return Err(NotariumError::EmbeddingUnavailable(format!(
                "expected {} embeddings, got {}",
                expected,
                parsed.embeddings.len()
            )));
        }

        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, mode: EmbedMode, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(vec![mode.apply(text)]).await?;
        Ok(vectors.remove(0))
    }

    async fn embed_batch(&self, mode: EmbedMode, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let input = texts.iter().map(|t| mode.apply(t)).collect();
        self.request(input).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Lazily initialized embedding handle.
///
/// Owns the model connection; construction happens exactly once on first
/// use and the handle is passed by reference to whoever needs it. Calls are
/// serialized: the underlying service is not assumed safe for concurrent
/// use.
pub struct LazyEmbedder {
    config: EmbeddingConfig,
    cell: OnceCell<OllamaEmbedder>,
    lock: Mutex<()>,
}

impl LazyEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
            lock: Mutex::new(()),
        }
    }

    async fn inner(&self) -> Result<&OllamaEmbedder> {
        self.cell
            .get_or_try_init(|| OllamaEmbedder::connect(&self.config))
            .await
    }
}

#[async_trait]
impl Embedder for LazyEmbedder {
    async fn embed(&self, mode: EmbedMode, text: &str) -> Result<Vec<f32>> {
        let _guard = self.lock.lock().await;
        self.inner().await?.embed(mode, text).await
    }

    async fn embed_batch(&self, mode: EmbedMode, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let _guard = self.lock.lock().await;
        self.inner().await?.embed_batch(mode, texts).await
    }

    /// Zero until the first successful call when not configured explicitly
    fn dimensions(&self) -> usize {
        self.cell
            .get()
            .map(|e| e.dimensions())
            .or(self.config.dimensions)
            .unwrap_or(0)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

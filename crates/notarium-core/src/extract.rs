//! LLM-based metadata extraction
//!
//! Used by the ingestion pipeline's opt-in frontmatter repair. Only the
//! input/output contract matters here: content in, best-effort metadata out.
//! Extraction failure is never fatal; the pipeline falls back to plain
//! defaults.

use crate::error::{NotariumError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Content is truncated before extraction to stay inside the model context
const MAX_CONTENT_LENGTH: usize = 4000;

const EXTRACTION_PROMPT: &str = "Analyze the following document and extract metadata.\n\
Return a JSON object with these fields:\n\
- title: The document's title (string)\n\
- authors: List of author names if present (array of strings, empty if none found)\n\
- summary: A brief 1-2 sentence summary of the content (string)\n\
- tags: 3-5 relevant topic tags/keywords (array of strings)\n\n\
Only return valid JSON, no other text.\n\nDocument:\n";

/// Metadata extracted from document content
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Metadata extraction contract
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, content: &str) -> Result<ExtractedMetadata>;
}

/// Extractor that returns empty metadata (extraction disabled)
pub struct NoopExtractor;

#[async_trait]
impl MetadataExtractor for NoopExtractor {
    async fn extract(&self, _content: &str) -> Result<ExtractedMetadata> {
        Ok(ExtractedMetadata::default())
    }
}

/// Extractor backed by a local Ollama model
pub struct OllamaExtractor {
    http_client: reqwest::Client,
    host: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaExtractor {
    pub fn new(host: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| NotariumError::BackendUnavailable(e.to_string()))?;
        Ok(Self {
            http_client,
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl MetadataExtractor for OllamaExtractor {
    async fn extract(&self, content: &str) -> Result<ExtractedMetadata> {
        let truncated = truncate_chars(content, MAX_CONTENT_LENGTH);
        let request = GenerateRequest {
            model: &self.model,
            prompt: format!("{}{}", EXTRACTION_PROMPT, truncated),
            stream: false,
            format: "json",
        };

        let url = format!("{}/api/generate", self.host);
        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotariumError::BackendUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotariumError::BackendResponse(format!(
                "extraction request failed with {}",
                response.status()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| NotariumError::BackendResponse(e.to_string()))?;

        serde_json::from_str(&parsed.response)
            .map_err(|e| NotariumError::BackendResponse(format!("extractor returned invalid JSON: {}", e)))
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_extractor_returns_empty() {
        let meta = NoopExtractor.extract("anything").await.unwrap();
        assert!(meta.title.is_empty());
        assert!(meta.tags.is_empty());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "héllo wörld";
        assert_eq!(truncate_chars(text, 5), "héllo");
        assert_eq!(truncate_chars(text, 100), text);
    }

    #[test]
    fn test_extracted_metadata_tolerates_missing_fields() {
        let meta: ExtractedMetadata = serde_json::from_str(r#"{"title": "T"}"#).unwrap();
        assert_eq!(meta.title, "T");
        assert!(meta.authors.is_empty());
    }
}

//! Retrieval: vector search plus prompt-ready formatting

use crate::embed::{EmbedMode, Embedder};
use crate::error::Result;
use crate::store::VectorStore;

/// One retrieved chunk with attribution
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextChunk {
    pub text: String,
    pub title: String,
    pub path: String,
    pub note_id: String,
    pub seq: u32,
    pub score: f32,
}

impl ContextChunk {
    /// Identity of this chunk within its note (`path#seq`), recorded on
    /// conversation turns to say which context grounded a reply
    pub fn id(&self) -> String {
        format!("{}#{}", self.path, self.seq)
    }
}

/// Search the store for chunks relevant to `query`.
///
/// Embeds the query with the query-mode marker and ranks by similarity. An
/// empty store or zero matches yields an empty list, never an error.
pub async fn search_context(
    store: &VectorStore,
    embedder: &dyn Embedder,
    query: &str,
    limit: usize,
) -> Result<Vec<ContextChunk>> {
    if store.chunk_count()? == 0 {
        return Ok(Vec::new());
    }

    let query_vector = embedder.embed(EmbedMode::Query, query).await?;
    let hits = store.search(&query_vector, limit)?;

    Ok(hits
        .into_iter()
        .map(|(chunk, score)| ContextChunk {
            text: chunk.text,
            title: chunk.title,
            path: chunk.path,
            note_id: chunk.note_id,
            seq: chunk.seq,
            score,
        })
        .collect())
}

/// Format retrieved chunks for prompt injection
pub fn format_context(chunks: &[ContextChunk]) -> String {
    if chunks.is_empty() {
        return "(No relevant context found in vault)".to_string();
    }

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}] {} ({})\n{}", i + 1, chunk.title, chunk.path, chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Brief source listing for terminal display
pub fn format_context_summary(chunks: &[ContextChunk]) -> String {
    if chunks.is_empty() {
        return "No matching notes found.".to_string();
    }

    let sources: Vec<String> = chunks
        .iter()
        .map(|chunk| format!("  - {}", chunk.title))
        .collect();
    format!("Retrieved context from:\n{}", sources.join("\n"))
}

//! MCP tool definitions and handlers

use crate::protocol::*;
use anyhow::Result;
use notarium_core::{search_context, ContextChunk, Embedder, VectorStore};
use serde_json::Value;

const DEFAULT_SEARCH_LIMIT: u64 = 5;

pub fn search_notes_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "search_notes".to_string(),
        description: "Semantic search over the markdown vault; returns the most relevant note excerpts".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query (natural language)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum excerpts to return (default: 5)",
                    "default": 5
                }
            },
            "required": ["query"]
        }),
    }
}

pub fn read_full_note_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "read_full_note".to_string(),
        description: "Read the full indexed content of a note by its note id".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "note_id": {
                    "type": "string",
                    "description": "Note id, as returned by search_notes"
                }
            },
            "required": ["note_id"]
        }),
    }
}

pub async fn handle_search_notes(
    store: &VectorStore,
    embedder: &dyn Embedder,
    args: Value,
) -> Result<ToolResult> {
    let query = args
        .get("query")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing query"))?;

    let limit = args
        .get("limit")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_SEARCH_LIMIT) as usize;

    let chunks = search_context(store, embedder, query, limit).await?;

    let text = if chunks.is_empty() {
        format!("No notes matched \"{}\"", query)
    } else {
        chunks
            .iter()
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "[{}] {} ({}, score {:.2})\n{}",
                    i + 1,
                    c.title,
                    c.path,
                    c.score,
                    c.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    };

    let structured: Vec<Value> = chunks
        .iter()
        .map(|c: &ContextChunk| {
            serde_json::json!({
                "id": c.id(),
                "note_id": c.note_id,
                "title": c.title,
                "path": c.path,
                "score": (c.score * 100.0).round() / 100.0,
                "text": c.text,
            })
        })
        .collect();

    Ok(ToolResult {
        content: vec![Content::Text { text }],
        structured_content: Some(serde_json::json!({ "results": structured })),
        is_error: None,
    })
}

pub async fn handle_read_full_note(store: &VectorStore, args: Value) -> Result<ToolResult> {
    let note_id = args
        .get("note_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing note_id"))?;

    let content = store.get_note(note_id)?;

    Ok(ToolResult {
        content: vec![Content::Text {
            text: content.clone(),
        }],
        structured_content: Some(serde_json::json!({
            "note_id": note_id,
            "content": content,
        })),
        is_error: None,
    })
}

//! Ingestion pipeline
//!
//! Reconciles vault state with store state in one sequential pass:
//! parse frontmatter, filter on status, skip unchanged files by content
//! fingerprint, re-chunk and re-embed the rest, and prune files that left
//! the vault. One broken file is reported and skipped, never fatal to the
//! pass. Concurrent passes against the same store are not supported; the
//! caller must prevent them.

use crate::config::Config;
use crate::embed::{EmbedMode, Embedder};
use crate::error::Result;
use crate::extract::MetadataExtractor;
use crate::index::chunker::chunk_markdown;
use crate::index::scanner::scan_vault;
use crate::store::{ChunkRecord, VectorStore};
use crate::vault::Frontmatter;
use std::collections::HashSet;
use std::path::Path;

/// Outcome of one ingestion pass
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub files_seen: usize,
    pub indexed: usize,
    pub skipped_status: usize,
    pub skipped_unchanged: usize,
    pub repaired: usize,
    pub pruned: usize,
    /// (relative path, error message) for every file that failed
    pub errors: Vec<(String, String)>,
}

impl IngestReport {
    pub fn had_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Run a full ingestion pass over the vault.
///
/// `extractor` is consulted only when `ingest.auto_repair` and
/// `ingest.auto_extract` are both enabled and a file's frontmatter is
/// incomplete.
pub async fn ingest_vault(
    config: &Config,
    store: &mut VectorStore,
    embedder: &dyn Embedder,
    extractor: Option<&dyn MetadataExtractor>,
) -> Result<IngestReport> {
    let files = scan_vault(&config.vault_path)?;
    let mut report = IngestReport {
        files_seen: files.len(),
        ..Default::default()
    };

    tracing::info!(vault = %config.vault_path.display(), files = files.len(), "starting ingestion pass");

    let mut seen_paths: HashSet<String> = HashSet::with_capacity(files.len());
    for file in &files {
        seen_paths.insert(file.relative_path.clone());

        match process_file(config, store, embedder, extractor, &file.path, &file.relative_path, &mut report)
            .await
        {
            Ok(outcome) => match outcome {
                FileOutcome::Indexed => report.indexed += 1,
                FileOutcome::SkippedStatus => report.skipped_status += 1,
                FileOutcome::SkippedUnchanged => report.skipped_unchanged += 1,
            },
            Err(e) => {
                tracing::warn!(path = %file.relative_path, error = %e, "skipping file");
                report.errors.push((file.relative_path.clone(), e.to_string()));
            }
        }
    }

    // Orphan cleanup runs once at the end of the pass so an interrupted run
    // never drops files that are still present in the vault.
    let orphans: Vec<String> = store
        .indexed_paths()?
        .into_iter()
        .filter(|p| !seen_paths.contains(p))
        .collect();
    report.pruned = store.remove_paths(&orphans)?;

    tracing::info!(
        indexed = report.indexed,
        unchanged = report.skipped_unchanged,
        pruned = report.pruned,
        errors = report.errors.len(),
        "ingestion pass complete"
    );
    Ok(report)
}

enum FileOutcome {
    Indexed,
    SkippedStatus,
    SkippedUnchanged,
}

async fn process_file(
    config: &Config,
    store: &mut VectorStore,
    embedder: &dyn Embedder,
    extractor: Option<&dyn MetadataExtractor>,
    path: &Path,
    relative_path: &str,
    report: &mut IngestReport,
) -> Result<FileOutcome> {
    let raw = std::fs::read_to_string(path)?;
    let (mut frontmatter, body) = Frontmatter::parse(&raw, relative_path)?;
    let body = body.to_string();

    // Repair rewrites the file, so the fingerprint must cover the repaired
    // content or the next pass re-embeds every repaired note.
    let content = if config.ingest.auto_repair && !frontmatter.is_complete() {
        let repaired = repair_frontmatter(config, extractor, path, &mut frontmatter, &body).await?;
        report.repaired += 1;
        repaired
    } else {
        raw
    };

    if !frontmatter.should_index() {
        tracing::debug!(path = relative_path, status = ?frontmatter.status, "not active, skipping");
        return Ok(FileOutcome::SkippedStatus);
    }

    let fingerprint = blake3::hash(content.as_bytes()).to_hex().to_string();
    if store.fingerprint(relative_path)?.as_deref() == Some(fingerprint.as_str()) {
        return Ok(FileOutcome::SkippedUnchanged);
    }

    let file_stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(relative_path);
    let title = frontmatter.display_title(file_stem);
    let note_id = frontmatter
        .id
        .clone()
        .unwrap_or_else(|| relative_path.to_string());

    let chunks = chunk_markdown(&body, config.chunking.chunk_size, config.chunking.chunk_overlap);
    if chunks.is_empty() {
        // Nothing to embed; still record the fingerprint so the empty file
        // is not re-visited every pass.
        store.upsert_file(relative_path, &fingerprint, &[])?;
        return Ok(FileOutcome::Indexed);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(EmbedMode::Document, &texts).await?;

    let records: Vec<ChunkRecord> = chunks
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(seq, (chunk, embedding))| ChunkRecord {
            note_id: note_id.clone(),
            seq: seq as u32,
            text: chunk.text,
            title: title.clone(),
            tags: frontmatter.tags.clone(),
            embedding,
        })
        .collect();

    store.upsert_file(relative_path, &fingerprint, &records)?;
    tracing::debug!(path = relative_path, chunks = records.len(), "indexed");
    Ok(FileOutcome::Indexed)
}

/// Fill missing frontmatter fields and rewrite the file, returning the
/// rewritten content.
///
/// Extraction is best-effort: an unavailable extractor downgrades to plain
/// defaults rather than failing the file.
async fn repair_frontmatter(
    config: &Config,
    extractor: Option<&dyn MetadataExtractor>,
    path: &Path,
    frontmatter: &mut Frontmatter,
    body: &str,
) -> Result<String> {
    if config.ingest.auto_extract {
        if let Some(extractor) = extractor {
            match extractor.extract(body).await {
                Ok(meta) => {
                    if frontmatter.title.as_deref().map_or(true, str::is_empty) && !meta.title.is_empty() {
                        frontmatter.title = Some(meta.title);
                    }
                    if frontmatter.summary.is_none() && !meta.summary.is_empty() {
                        frontmatter.summary = Some(meta.summary);
                    }
                    if frontmatter.tags.is_empty() {
                        frontmatter.tags = meta.tags;
                    }
                    if frontmatter.authors.is_empty() {
                        frontmatter.authors = meta.authors;
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "metadata extraction failed, using defaults");
                }
            }
        }
    }

    let file_stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("note");
    frontmatter.coerce(file_stem);

    let repaired = frontmatter.render(body)?;
    std::fs::write(path, &repaired)?;
    tracing::info!(path = %path.display(), "repaired frontmatter");
    Ok(repaired)
}

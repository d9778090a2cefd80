//! SQLite vector store
//!
//! Chunks live in one table keyed by (path, seq); embeddings are stored as
//! little-endian f32 BLOBs and similarity is computed in Rust. Replacement
//! is delete-then-insert per source path inside one transaction, so the
//! ingestion pipeline sees the swap as atomic (a concurrent reader may
//! transiently observe zero rows for the path being swapped).

use crate::error::{NotariumError, Result};
use rusqlite::{params, Connection};
use std::path::Path;

/// A chunk row ready to be written
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub note_id: String,
    pub seq: u32,
    pub text: String,
    pub title: String,
    pub tags: Vec<String>,
    pub embedding: Vec<f32>,
}

/// A chunk row read back from the store
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub path: String,
    pub seq: u32,
    pub note_id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub text: String,
}

const CREATE_TABLES: &str = r#"
-- One row per chunk; path is the note's vault-relative path
CREATE TABLE IF NOT EXISTS chunks (
    path TEXT NOT NULL,
    seq INTEGER NOT NULL,
    note_id TEXT NOT NULL,
    title TEXT NOT NULL,
    tags TEXT NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (path, seq)
);

CREATE INDEX IF NOT EXISTS idx_chunks_note_id ON chunks(note_id);

-- Per-file content fingerprint for unchanged-file detection
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    fingerprint TEXT NOT NULL,
    indexed_at TEXT NOT NULL
);
"#;

/// On-disk table of note chunks
pub struct VectorStore {
    conn: Connection,
}

impl VectorStore {
    /// Open (or create) the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| NotariumError::StoreUnavailable(format!("{}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| NotariumError::StoreUnavailable(format!("{}: {}", path.display(), e)))?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// In-memory store for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| NotariumError::StoreUnavailable(e.to_string()))?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_TABLES)
            .map_err(|e| NotariumError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Replace all rows for `path` with `chunks` and record the fingerprint.
    ///
    /// Delete-before-insert in a single transaction.
    pub fn upsert_file(&mut self, path: &str, fingerprint: &str, chunks: &[ChunkRecord]) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM chunks WHERE path = ?1", params![path])?;
        for chunk in chunks {
            tx.execute(
                "INSERT INTO chunks (path, seq, note_id, title, tags, text, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    path,
                    chunk.seq,
                    chunk.note_id,
                    chunk.title,
                    chunk.tags.join(","),
                    chunk.text,
                    embedding_to_bytes(&chunk.embedding),
                ],
            )?;
        }
        tx.execute(
            "INSERT INTO files (path, fingerprint, indexed_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET fingerprint = excluded.fingerprint,
                                             indexed_at = excluded.indexed_at",
            params![path, fingerprint, now],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Stored fingerprint for a path, if the file was indexed before
    pub fn fingerprint(&self, path: &str) -> Result<Option<String>> {
        let result = self.conn.query_row(
            "SELECT fingerprint FROM files WHERE path = ?1",
            params![path],
            |row| row.get(0),
        );
        match result {
            Ok(fp) => Ok(Some(fp)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Top-k most similar chunks, ranked by descending cosine similarity.
    ///
    /// Ties break on (seq, path) ascending so results are deterministic.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<(StoredChunk, f32)>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, seq, note_id, title, tags, text, embedding FROM chunks",
        )?;

        let mut scored: Vec<(StoredChunk, f32)> = stmt
            .query_map([], |row| {
                let embedding_bytes: Vec<u8> = row.get(6)?;
                Ok((read_chunk_row(row)?, bytes_to_embedding(&embedding_bytes)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(chunk, embedding)| {
                let score = cosine_similarity(query_vec, &embedding);
                (chunk, score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.seq.cmp(&b.0.seq))
                .then_with(|| a.0.path.cmp(&b.0.path))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Reconstruct a full note from its chunks, in sequence order
    pub fn get_note(&self, note_id: &str) -> Result<String> {
        let mut stmt = self.conn.prepare(
            "SELECT text FROM chunks WHERE note_id = ?1 ORDER BY seq ASC",
        )?;
        let texts: Vec<String> = stmt
            .query_map(params![note_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if texts.is_empty() {
            return Err(NotariumError::NoteNotFound(note_id.to_string()));
        }
        Ok(texts.join("\n\n"))
    }

    /// All paths currently indexed
    pub fn indexed_paths(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT path FROM files ORDER BY path")?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(paths)
    }

    /// Remove all rows for the given paths (orphan pruning). Returns the
    /// number of files removed.
    pub fn remove_paths(&mut self, paths: &[String]) -> Result<usize> {
        if paths.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut removed = 0;
        for path in paths {
            tx.execute("DELETE FROM chunks WHERE path = ?1", params![path])?;
            removed += tx.execute("DELETE FROM files WHERE path = ?1", params![path])?;
        }
        tx.commit()?;
        Ok(removed)
    }

    pub fn chunk_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn file_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn read_chunk_row(row: &rusqlite::Row<'_>) -> std::result::Result<StoredChunk, rusqlite::Error> {
    let tags: String = row.get(4)?;
    Ok(StoredChunk {
        path: row.get(0)?,
        seq: row.get(1)?,
        note_id: row.get(2)?,
        title: row.get(3)?,
        tags: if tags.is_empty() {
            Vec::new()
        } else {
            tags.split(',').map(str::to_string).collect()
        },
        text: row.get(5)?,
    })
}

/// Convert f32 embedding to bytes (little-endian)
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert bytes to f32 embedding
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(note_id: &str, seq: u32, text: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            note_id: note_id.to_string(),
            seq,
            text: text.to_string(),
            title: format!("Title of {}", note_id),
            tags: vec!["test".to_string()],
            embedding,
        }
    }

    #[test]
    fn test_embedding_roundtrip() {
        let original = vec![1.0f32, 2.0, 3.0, -1.5];
        let bytes = embedding_to_bytes(&original);
        let restored = bytes_to_embedding(&bytes);
        assert_eq!(original, restored);
    }

    #[test]
    fn test_cosine_similarity_identical_and_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.0001);
    }

    #[test]
    fn test_upsert_replaces_all_rows_for_path() {
        let mut store = VectorStore::open_in_memory().unwrap();

        let old = vec![
            record("n1", 0, "old chunk 0", vec![1.0, 0.0]),
            record("n1", 1, "old chunk 1", vec![0.0, 1.0]),
            record("n1", 2, "old chunk 2", vec![1.0, 1.0]),
        ];
        store.upsert_file("a.md", "fp-old", &old).unwrap();
        assert_eq!(store.chunk_count().unwrap(), 3);

        let new = vec![record("n1", 0, "new chunk 0", vec![0.5, 0.5])];
        store.upsert_file("a.md", "fp-new", &new).unwrap();

        // Old rows are gone, not lingering next to the new ones.
        assert_eq!(store.chunk_count().unwrap(), 1);
        assert_eq!(store.fingerprint("a.md").unwrap().as_deref(), Some("fp-new"));
        assert_eq!(store.get_note("n1").unwrap(), "new chunk 0");
    }

    #[test]
    fn test_search_ranking_and_tiebreak() {
        let mut store = VectorStore::open_in_memory().unwrap();
        store
            .upsert_file(
                "a.md",
                "fp",
                &[
                    record("n1", 0, "exact match", vec![1.0, 0.0]),
                    record("n1", 1, "orthogonal", vec![0.0, 1.0]),
                ],
            )
            .unwrap();
        store
            .upsert_file("b.md", "fp", &[record("n2", 0, "also exact", vec![2.0, 0.0])])
            .unwrap();

        let results = store.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(results.len(), 3);
        // Both exact matches score 1.0; tie breaks by seq then path.
        assert_eq!(results[0].0.path, "a.md");
        assert_eq!(results[1].0.path, "b.md");
        assert!((results[0].1 - 1.0).abs() < 0.0001);
        assert_eq!(results[2].0.text, "orthogonal");
    }

    #[test]
    fn test_search_empty_store() {
        let store = VectorStore::open_in_memory().unwrap();
        assert!(store.search(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_get_note_concatenates_in_order() {
        let mut store = VectorStore::open_in_memory().unwrap();
        store
            .upsert_file(
                "a.md",
                "fp",
                &[
                    record("n1", 1, "second", vec![0.0, 1.0]),
                    record("n1", 0, "first", vec![1.0, 0.0]),
                ],
            )
            .unwrap();
        assert_eq!(store.get_note("n1").unwrap(), "first\n\nsecond");
    }

    #[test]
    fn test_get_note_unknown_id() {
        let store = VectorStore::open_in_memory().unwrap();
        let err = store.get_note("ghost").unwrap_err();
        assert!(matches!(err, NotariumError::NoteNotFound(_)));
    }

    #[test]
    fn test_remove_paths_prunes_everything() {
        let mut store = VectorStore::open_in_memory().unwrap();
        store
            .upsert_file("a.md", "fp", &[record("n1", 0, "a", vec![1.0])])
            .unwrap();
        store
            .upsert_file("b.md", "fp", &[record("n2", 0, "b", vec![1.0])])
            .unwrap();

        let removed = store.remove_paths(&["a.md".to_string()]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.indexed_paths().unwrap(), vec!["b.md"]);
        assert!(store.get_note("n1").is_err());
    }

    #[test]
    fn test_open_bad_location_is_store_unavailable() {
        let err = VectorStore::open(Path::new("/dev/null/not-a-dir/store.sqlite")).err().unwrap();
        assert!(matches!(err, NotariumError::StoreUnavailable(_)));
    }
}

//! Vault scanning

use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// A markdown file found in the vault
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub path: PathBuf,
    /// Path relative to the vault root, used as the store key
    pub relative_path: String,
}

/// Scan the vault for markdown files.
///
/// Hidden files and directories (`.obsidian`, `.git`, ...) are skipped.
/// Results are sorted by relative path so ingestion passes are ordered
/// deterministically.
pub fn scan_vault(root: &Path) -> Result<Vec<ScanResult>> {
    let mut results = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| path.to_string_lossy().to_string());

        results.push(ScanResult {
            path: path.to_path_buf(),
            relative_path: relative,
        });
    }

    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_string_lossy()
            .starts_with('.')
}

//! Frontmatter parsing and the note status model
//!
//! Notes carry an optional YAML header delimited by `---` lines. A missing
//! header is not an error: the note falls back to defaults and is treated as
//! `active`. A header that is present but not valid YAML is rejected with
//! `MalformedFrontmatter`. Repairing a file on disk is the ingestion
//! pipeline's call, never this module's.

use crate::error::{NotariumError, Result};
use serde::{Deserialize, Serialize};

/// Note lifecycle status
///
/// Only `active` notes are indexed into the vector store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Draft,
    Pending,
    #[default]
    Active,
    Archived,
    Deleted,
}

/// Structured metadata header of a note
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Frontmatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub note_type: Option<String>,

    #[serde(default)]
    pub status: Status,

    /// Creation date, YYYY-MM-DD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Free-text provenance tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

const DELIMITER: &str = "---";

impl Frontmatter {
    /// Parse a raw note into its frontmatter and body.
    ///
    /// `path` is only used for error context. An absent header yields
    /// defaults plus the whole text as body.
    pub fn parse<'a>(raw: &'a str, path: &str) -> Result<(Frontmatter, &'a str)> {
        let Some(rest) = raw.strip_prefix(DELIMITER) else {
            return Ok((Frontmatter::default(), raw));
        };
        // The opening delimiter must be a line of its own (LF or CRLF).
        let Some(rest) = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
        else {
            return Ok((Frontmatter::default(), raw));
        };

        let Some((end, line_len)) = find_closing_delimiter(rest) else {
            return Err(NotariumError::MalformedFrontmatter {
                path: path.to_string(),
                reason: "unterminated frontmatter block".to_string(),
            });
        };

        let header = &rest[..end];
        let body = rest[end + line_len..].trim_start_matches(['\r', '\n']);

        let frontmatter: Frontmatter =
            serde_yaml::from_str(header).map_err(|e| NotariumError::MalformedFrontmatter {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        Ok((frontmatter, body))
    }

    /// Whether the note should be indexed (status resolves to active)
    pub fn should_index(&self) -> bool {
        self.status == Status::Active
    }

    /// Whether all required fields are present and non-empty
    pub fn is_complete(&self) -> bool {
        self.id.as_deref().is_some_and(|s| !s.is_empty())
            && self.title.as_deref().is_some_and(|s| !s.is_empty())
            && self.note_type.as_deref().is_some_and(|s| !s.is_empty())
            && self.created.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Fill required fields with defaults. Does not touch the file on disk.
    ///
    /// `file_stem` seeds the title fallback and the generated id.
    pub fn coerce(&mut self, file_stem: &str) {
        if self.id.as_deref().map_or(true, str::is_empty) {
            self.id = Some(generate_note_id(file_stem));
        }
        if self.title.as_deref().map_or(true, str::is_empty) {
            self.title = Some(file_stem.replace(['-', '_'], " "));
        }
        if self.note_type.as_deref().map_or(true, str::is_empty) {
            self.note_type = Some("general".to_string());
        }
        if self.created.as_deref().map_or(true, str::is_empty) {
            self.created = Some(chrono::Local::now().format("%Y-%m-%d").to_string());
        }
    }

    /// Effective title for display (falls back to the file stem)
    pub fn display_title(&self, file_stem: &str) -> String {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| file_stem.replace(['-', '_'], " "))
    }

    /// Serialize back to a full note: `---` header + body
    pub fn render(&self, body: &str) -> Result<String> {
        let yaml = serde_yaml::to_string(self)?;
        Ok(format!("{}\n{}{}\n\n{}", DELIMITER, yaml, DELIMITER, body))
    }
}

/// Find a `---` line closing the header, returning the byte offset of its
/// start and the full line length (including the newline, when present)
fn find_closing_delimiter(rest: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            return Some((offset, line.len()));
        }
        offset += line.len();
    }
    None
}

/// Generate an opaque note id (stable once written into the file)
fn generate_note_id(seed: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let hash = blake3::hash(format!("{}:{}", seed, nanos).as_bytes());
    hash.to_hex()[..32].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_header() {
        let raw = "---\nid: abc123\ntitle: API Notes\nstatus: active\ntags:\n  - api\n  - auth\n---\n\nBody text here.";
        let (fm, body) = Frontmatter::parse(raw, "api.md").unwrap();
        assert_eq!(fm.id.as_deref(), Some("abc123"));
        assert_eq!(fm.title.as_deref(), Some("API Notes"));
        assert_eq!(fm.status, Status::Active);
        assert_eq!(fm.tags, vec!["api", "auth"]);
        assert_eq!(body, "Body text here.");
    }

    #[test]
    fn test_parse_absent_header_defaults_active() {
        let raw = "Just a plain note without a header.";
        let (fm, body) = Frontmatter::parse(raw, "plain.md").unwrap();
        assert_eq!(fm.status, Status::Active);
        assert!(fm.should_index());
        assert_eq!(body, raw);
    }

    #[test]
    fn test_parse_malformed_header_errors() {
        let raw = "---\ntitle: [unclosed\nstatus: :::\n---\n\nBody.";
        let err = Frontmatter::parse(raw, "bad.md").unwrap_err();
        match err {
            NotariumError::MalformedFrontmatter { path, .. } => assert_eq!(path, "bad.md"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unterminated_header_errors() {
        let raw = "---\ntitle: Oops\nstatus: active\n\nNo closing fence.";
        assert!(Frontmatter::parse(raw, "open.md").is_err());
    }

    #[test]
    fn test_parse_crlf_line_endings() {
        let raw = "---\r\ntitle: Windows Note\r\nstatus: pending\r\n---\r\n\r\nBody line.";
        let (fm, body) = Frontmatter::parse(raw, "w.md").unwrap();
        assert_eq!(fm.title.as_deref(), Some("Windows Note"));
        assert_eq!(fm.status, Status::Pending);
        assert!(!fm.should_index());
        assert_eq!(body, "Body line.");
    }

    #[test]
    fn test_parse_closing_fence_at_eof() {
        let raw = "---\ntitle: Terse\n---";
        let (fm, body) = Frontmatter::parse(raw, "t.md").unwrap();
        assert_eq!(fm.title.as_deref(), Some("Terse"));
        assert_eq!(body, "");
    }

    #[test]
    fn test_non_active_statuses_not_indexed() {
        for status in ["draft", "pending", "archived", "deleted"] {
            let raw = format!("---\nstatus: {}\n---\nBody.", status);
            let (fm, _) = Frontmatter::parse(&raw, "s.md").unwrap();
            assert!(!fm.should_index(), "status {} should not index", status);
        }
    }

    #[test]
    fn test_coerce_fills_required_fields() {
        let mut fm = Frontmatter::default();
        assert!(!fm.is_complete());
        fm.coerce("meeting-notes");
        assert!(fm.is_complete());
        assert_eq!(fm.title.as_deref(), Some("meeting notes"));
        assert_eq!(fm.note_type.as_deref(), Some("general"));
        assert_eq!(fm.id.as_ref().unwrap().len(), 32);
    }

    #[test]
    fn test_coerce_preserves_existing() {
        let mut fm = Frontmatter {
            id: Some("keep-me".to_string()),
            title: Some("Kept Title".to_string()),
            ..Default::default()
        };
        fm.coerce("other");
        assert_eq!(fm.id.as_deref(), Some("keep-me"));
        assert_eq!(fm.title.as_deref(), Some("Kept Title"));
    }

    #[test]
    fn test_render_roundtrip() {
        let mut fm = Frontmatter::default();
        fm.coerce("roundtrip");
        fm.tags = vec!["alpha".to_string()];
        let rendered = fm.render("The body.").unwrap();
        let (parsed, body) = Frontmatter::parse(&rendered, "roundtrip.md").unwrap();
        assert_eq!(parsed.id, fm.id);
        assert_eq!(parsed.tags, fm.tags);
        assert_eq!(body, "The body.");
    }
}

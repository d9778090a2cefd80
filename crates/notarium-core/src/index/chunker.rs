//! Markdown chunking for embedding
//!
//! Two-stage strategy: split at heading boundaries first so a chunk never
//! silently spans two sections, then recursively split any oversized section
//! with progressively finer separators. Adjacent sub-chunks share
//! `chunk_overlap` characters of context. Purely a function of its inputs:
//! same text and parameters always produce the same chunk sequence.

/// Default chunking parameters
pub const DEFAULT_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Separators tried coarsest-first when a section exceeds the chunk size.
/// A piece with no separator left (a single long word) is emitted unsplit:
/// content is never truncated or broken mid-word.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// Maximum heading depth that starts a new section
const MAX_HEADING_LEVEL: usize = 3;

/// One chunk of a note body
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkText {
    /// Chunk text, prefixed with its heading trail when one exists
    pub text: String,
    /// Heading trail this chunk sits under, outermost first
    pub heading_path: Vec<String>,
}

/// Split a markdown body into overlapping chunks.
///
/// An empty (or whitespace-only) body yields zero chunks.
pub fn chunk_markdown(body: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<ChunkText> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    for section in split_by_headings(body) {
        let content = section.content.trim();
        if content.is_empty() {
            continue;
        }

        let trail = section.heading_path.join(" > ");
        let pieces = if content.len() <= chunk_size {
            vec![content.to_string()]
        } else {
            split_recursive(content, chunk_size, chunk_overlap, SEPARATORS)
        };

        for piece in pieces {
            let piece = piece.trim_end();
            if piece.is_empty() {
                continue;
            }
            let text = if trail.is_empty() {
                piece.to_string()
            } else {
                format!("{}\n{}", trail, piece)
            };
            chunks.push(ChunkText {
                text,
                heading_path: section.heading_path.clone(),
            });
        }
    }

    chunks
}

/// A contiguous run of lines under one heading trail
struct Section {
    heading_path: Vec<String>,
    content: String,
}

/// Stage 1: heading-aware split.
///
/// ATX headings up to `###` start a new section; fenced code blocks are
/// opaque so a `#` inside them never splits. Text before the first heading
/// forms a section with an empty trail.
fn split_by_headings(body: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut trail: Vec<String> = Vec::new();
    let mut content = String::new();
    let mut in_fence = false;

    for line in body.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }

        match (!in_fence).then(|| parse_heading(line)).flatten() {
            Some((level, title)) => {
                if !content.trim().is_empty() {
                    sections.push(Section {
                        heading_path: trail.clone(),
                        content: std::mem::take(&mut content),
                    });
                } else {
                    content.clear();
                }
                trail.truncate(level - 1);
                trail.push(title.to_string());
            }
            None => {
                content.push_str(line);
                content.push('\n');
            }
        }
    }

    if !content.trim().is_empty() {
        sections.push(Section {
            heading_path: trail,
            content,
        });
    }

    sections
}

/// Parse `# Title` through `### Title`, returning (level, title)
fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 || hashes > MAX_HEADING_LEVEL {
        return None;
    }
    let rest = line[hashes..].strip_prefix(' ')?;
    let title = rest.trim();
    (!title.is_empty()).then_some((hashes, title))
}

/// Stage 2: recursive separator split with overlap.
///
/// Picks the coarsest separator present, splits into separator-keeping
/// pieces, re-splits any piece still over `chunk_size` with the finer
/// separators, then greedily merges pieces back into chunks.
fn split_recursive(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    let Some(sep_idx) = separators.iter().position(|sep| text.contains(sep)) else {
        // Indivisible run (a single long word): emit unsplit, never truncate.
        return vec![text.to_string()];
    };

    let sep = separators[sep_idx];
    let mut pieces: Vec<String> = Vec::new();
    for piece in text.split_inclusive(sep) {
        if piece.len() > chunk_size {
            pieces.extend(split_recursive(
                piece,
                chunk_size,
                chunk_overlap,
                &separators[sep_idx + 1..],
            ));
        } else {
            pieces.push(piece.to_string());
        }
    }

    merge_pieces(pieces, chunk_size, chunk_overlap)
}

/// Greedily merge pieces into chunks of at most `chunk_size`, carrying up to
/// `chunk_overlap` trailing characters into the next chunk at piece
/// boundaries.
fn merge_pieces(pieces: Vec<String>, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for piece in pieces {
        if current_len + piece.len() > chunk_size && !current.is_empty() {
            chunks.push(current.concat());

            let mut carried: Vec<String> = Vec::new();
            let mut carried_len = 0usize;
            for prev in current.iter().rev() {
                if carried_len + prev.len() > chunk_overlap {
                    break;
                }
                carried_len += prev.len();
                carried.push(prev.clone());
            }
            carried.reverse();
            current = carried;
            current_len = carried_len;
        }

        current_len += piece.len();
        current.push(piece);
    }

    if !current.is_empty() {
        chunks.push(current.concat());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_yields_no_chunks() {
        assert!(chunk_markdown("", 100, 10).is_empty());
        assert!(chunk_markdown("   \n\n  ", 100, 10).is_empty());
    }

    #[test]
    fn test_small_body_single_chunk() {
        let chunks = chunk_markdown("Just a short note.", 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Just a short note.");
        assert!(chunks[0].heading_path.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let body = "# One\n\nAlpha beta gamma. Delta epsilon.\n\n## Two\n\nZeta eta theta iota kappa.";
        let a = chunk_markdown(body, 30, 8);
        let b = chunk_markdown(body, 30, 8);
        assert_eq!(a, b);
    }

    #[test]
    fn test_heading_boundaries_respected() {
        let body = "# Alpha\n\nFirst section text.\n\n# Beta\n\nSecond section text.";
        let chunks = chunk_markdown(body, 1000, 50);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.starts_with("Alpha\n"));
        assert!(chunks[0].text.contains("First section"));
        assert!(!chunks[0].text.contains("Second section"));
        assert_eq!(chunks[1].heading_path, vec!["Beta"]);
    }

    #[test]
    fn test_heading_trail_nests() {
        let body = "# Top\n\nIntro.\n\n## Inner\n\nDetail text.";
        let chunks = chunk_markdown(body, 1000, 0);
        assert_eq!(chunks[1].heading_path, vec!["Top", "Inner"]);
        assert!(chunks[1].text.starts_with("Top > Inner\n"));
    }

    #[test]
    fn test_hash_inside_code_fence_is_not_a_heading() {
        let body = "# Real\n\n```\n# not a heading\ncode line\n```\n\nAfter fence.";
        let chunks = chunk_markdown(body, 1000, 0);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("# not a heading"));
    }

    #[test]
    fn test_oversized_section_is_split_with_overlap() {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let body = sentence.repeat(20);
        let chunks = chunk_markdown(&body, 120, 50);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // Overlap carry can exceed the target by at most one piece.
            assert!(chunk.text.len() <= 120 + sentence.len());
        }
        // Adjacent chunks share trailing/leading context.
        let first = &chunks[0].text;
        let second = &chunks[1].text;
        let tail = &first[first.len().saturating_sub(20)..];
        assert!(second.contains(tail.trim()));
    }

    #[test]
    fn test_long_word_emitted_unsplit() {
        let word = "x".repeat(500);
        let body = format!("short intro {} short outro", word);
        let chunks = chunk_markdown(&body, 100, 10);
        assert!(chunks.iter().any(|c| c.text.contains(&word)));
    }

    #[test]
    fn test_no_content_loss_without_overlap() {
        let text = "One two three. Four five six. Seven eight nine. Ten eleven twelve.";
        let pieces = split_recursive(text, 25, 0, SEPARATORS);
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_all_lines_survive_chunking() {
        let body = "# H\n\nalpha one\n\nbeta two\n\ngamma three\n\ndelta four\n\nepsilon five";
        let chunks = chunk_markdown(body, 24, 0);
        for line in ["alpha one", "beta two", "gamma three", "delta four", "epsilon five"] {
            assert!(
                chunks.iter().any(|c| c.text.contains(line)),
                "line {:?} lost",
                line
            );
        }
    }

    #[test]
    fn test_utf8_content_survives() {
        let body = "# Ünïcode\n\nHello 世界, this is a test with emoji 🎉 and box chars ─ here. ".repeat(4);
        let chunks = chunk_markdown(&body, 60, 10);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(!chunk.text.is_empty());
        }
    }
}

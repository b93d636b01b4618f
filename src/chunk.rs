//! Adaptive, structure-aware text chunking
//!
//! Splits extracted document text into size-bounded fragments for embedding.
//! Detected section titles act as the highest-priority cut points, followed
//! by a fixed punctuation hierarchy. Target size and overlap adapt to the
//! document's page count, which is the proxy for extraction cost already
//! paid upstream.

use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;
use tracing::debug;

/// Chunks shorter than this after trimming are dropped.
pub const MIN_CHUNK_CHARS: usize = 50;

/// Chunking parameters selected from the document's page count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Upper bound for a merged chunk, in chars
    pub target_size: usize,
    /// Trailing window carried into the next chunk, in chars
    pub overlap: usize,
}

impl ChunkConfig {
    /// Select the configuration for a document of `pages` pages.
    pub fn for_pages(pages: usize) -> Self {
        if pages <= 10 {
            Self { target_size: 800, overlap: 150 }
        } else if pages <= 50 {
            Self { target_size: 1200, overlap: 150 }
        } else if pages <= 150 {
            Self { target_size: 1800, overlap: 100 }
        } else {
            Self { target_size: 2500, overlap: 80 }
        }
    }
}

/// Line patterns that mark a section boundary.
static TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Markdown headings
        r"^#{1,6}\s+.+$",
        // Decimal section numbers: 1. Título, 1.2 Subtítulo
        r"^\d+\.[\d.]*\s+[A-ZÁÉÍÓÚÑ].*$",
        // Roman numerals: I. Título
        r"^[IVXLCDM]+\.\s+.+$",
        // ALL-CAPS lines of at least 4 characters
        r"^[A-Z][A-Z\s]{3,}$",
        // Section keywords, Spanish and English
        r"^(?:Capítulo|Sección|Artículo|Anexo)\s+\d*.*$",
        r"^(?:Chapter|Section|Article|Annex)\s+\d*.*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid title pattern"))
    .collect()
});

/// Structural separators in priority order, applied after title separators.
const BASE_SEPARATORS: [&str; 9] =
    ["\n\n\n", "\n\n", "\n", ". ", "? ", "! ", "; ", ", ", " "];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Scan the text for title-looking lines and derive one literal separator
/// per distinct detected line.
pub fn detect_title_separators(text: &str) -> Vec<String> {
    let mut separators: Vec<String> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if TITLE_PATTERNS.iter().any(|p| p.is_match(trimmed)) {
            let separator = format!("\n{trimmed}\n");
            if char_len(trimmed) > 3 && !separators.contains(&separator) {
                separators.push(separator);
            }
        }
    }

    separators
}

/// Full separator list: detected titles first (longer titles bind tighter),
/// then the structural hierarchy.
fn build_separators(title_separators: &[String]) -> Vec<String> {
    let mut titles = title_separators.to_vec();
    titles.sort_by(|a, b| char_len(b).cmp(&char_len(a)));
    titles.extend(BASE_SEPARATORS.iter().map(|s| s.to_string()));
    titles
}

/// Recursive character splitter with merge-and-overlap emission.
struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    /// Split on the most preferred separator present in the text; fragments
    /// still longer than the target recurse with the remaining separators.
    fn split_text(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();

        let mut separator = separators.last().cloned().unwrap_or_default();
        let mut next_separators: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() || text.contains(candidate.as_str()) {
                separator = candidate.clone();
                next_separators = &separators[i + 1..];
                break;
            }
        }

        let mut pending: Vec<String> = Vec::new();
        for fragment in split_keeping_separator(text, &separator) {
            if char_len(&fragment) < self.chunk_size {
                pending.push(fragment);
            } else {
                if !pending.is_empty() {
                    chunks.extend(self.merge_fragments(&pending));
                    pending.clear();
                }
                if next_separators.is_empty() {
                    chunks.push(fragment);
                } else {
                    chunks.extend(self.split_text(&fragment, next_separators));
                }
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge_fragments(&pending));
        }

        chunks
    }

    /// Greedily merge adjacent fragments up to the target size. When a merge
    /// is emitted, trailing fragments totalling at most the overlap stay in
    /// the window and prefix the next emission, so overlap always lands on a
    /// separator boundary.
    fn merge_fragments(&self, fragments: &[String]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for fragment in fragments {
            let len = char_len(fragment);
            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(doc) = join_window(&window) {
                    merged.push(doc);
                }
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(fragment);
            total += len;
        }

        if let Some(doc) = join_window(&window) {
            merged.push(doc);
        }

        merged
    }
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split on a literal separator, keeping each separator attached to the
/// front of the fragment that follows it. Empty fragments are dropped.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }

    let mut boundaries = Vec::new();
    let mut from = 0;
    while let Some(pos) = text[from..].find(separator) {
        let absolute = from + pos;
        boundaries.push(absolute);
        from = absolute + separator.len();
    }

    let mut fragments = Vec::new();
    let mut previous = 0;
    for boundary in boundaries {
        if boundary > previous {
            fragments.push(text[previous..boundary].to_string());
        }
        previous = boundary;
    }
    if previous < text.len() {
        fragments.push(text[previous..].to_string());
    }

    fragments
}

/// Split `full_text` into chunks using the configuration for `page_count`.
///
/// Empty or whitespace-only text yields no chunks. Output chunks are
/// trimmed and at least [`MIN_CHUNK_CHARS`] long.
pub fn chunk(full_text: &str, page_count: usize) -> Vec<String> {
    chunk_with_config(full_text, ChunkConfig::for_pages(page_count))
}

/// Split with an explicit configuration.
pub fn chunk_with_config(text: &str, config: ChunkConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let titles = detect_title_separators(text);
    let separators = build_separators(&titles);
    debug!(
        titles = titles.len(),
        target_size = config.target_size,
        "splitting text"
    );

    let splitter = RecursiveSplitter {
        chunk_size: config.target_size,
        chunk_overlap: config.overlap,
    };

    let chunks: Vec<String> = splitter
        .split_text(text, &separators)
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| char_len(c) >= MIN_CHUNK_CHARS)
        .collect();

    debug!(chunks = chunks.len(), "chunking finished");
    chunks
}

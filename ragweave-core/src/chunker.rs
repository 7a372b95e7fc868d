//! Document chunking policies.
//!
//! Two strategies share the `Chunker` contract: a token-window policy that
//! splits on paragraph boundaries and windows oversized paragraphs, and a
//! heading-aware policy that tracks sections and tags chunks as title or
//! body text.

use crate::error::{RetrievalError, Result};
use crate::tokenize::{count_tokens, tokenize};
use crate::types::{Chunk, Document, META_SECTION, SECTION_BODY, SECTION_TITLE};
use std::collections::HashMap;

/// Splits a document into an ordered, finite sequence of chunks.
///
/// Every document yields at least one chunk, even when its content is empty,
/// so the engine always has an indexable unit per document.
pub trait Chunker: Send + Sync {
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>>;
}

// ---------------------------------------------------------------------------
// Token-window policy
// ---------------------------------------------------------------------------

/// Paragraph-based chunker with a sliding token window for long paragraphs.
#[derive(Debug, Clone)]
pub struct TokenWindowChunker {
    max_tokens: usize,
    min_tokens: usize,
    overlap: usize,
}

impl TokenWindowChunker {
    /// Create a token-window chunker.
    ///
    /// `overlap` must be strictly smaller than `max_tokens` so the window
    /// always advances.
    pub fn new(max_tokens: usize, min_tokens: usize, overlap: usize) -> Result<Self> {
        if max_tokens == 0 {
            return Err(RetrievalError::Config {
                message: "max_tokens must be nonzero".into(),
            });
        }
        if overlap >= max_tokens {
            return Err(RetrievalError::Config {
                message: format!("overlap ({overlap}) must be smaller than max_tokens ({max_tokens})"),
            });
        }
        Ok(Self {
            max_tokens,
            min_tokens,
            overlap,
        })
    }
}

impl Default for TokenWindowChunker {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            min_tokens: 32,
            overlap: 32,
        }
    }
}

impl Chunker for TokenWindowChunker {
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        if document.content.trim().is_empty() {
            return Ok(vec![make_chunk(document, 0, &document.content, "")]);
        }

        let mut pieces = Vec::new();
        for paragraph in split_paragraphs(&document.content) {
            pieces.extend(window_paragraph(paragraph, self.max_tokens, self.overlap));
        }
        let pieces = merge_undersized(pieces, self.min_tokens);

        Ok(pieces
            .iter()
            .enumerate()
            .map(|(i, text)| make_chunk(document, i, text, ""))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Heading-aware policy
// ---------------------------------------------------------------------------

/// Heading-aware chunker: opens a new logical section at each `#` heading,
/// bounds paragraphs within a section, and tags chunks as title or body.
#[derive(Debug, Clone)]
pub struct HeadingAwareChunker {
    max_tokens: usize,
    overlap: usize,
    /// Sections shorter than this are buffered and concatenated with the
    /// next section before emission.
    min_section_tokens: usize,
}

impl HeadingAwareChunker {
    pub fn new(max_tokens: usize, overlap: usize, min_section_tokens: usize) -> Result<Self> {
        if max_tokens == 0 {
            return Err(RetrievalError::Config {
                message: "max_tokens must be nonzero".into(),
            });
        }
        if overlap >= max_tokens {
            return Err(RetrievalError::Config {
                message: format!("overlap ({overlap}) must be smaller than max_tokens ({max_tokens})"),
            });
        }
        Ok(Self {
            max_tokens,
            overlap,
            min_section_tokens,
        })
    }

    fn emit_section(&self, document: &Document, section: &str, chunks: &mut Vec<Chunk>) {
        for paragraph in split_paragraphs(section) {
            for text in window_paragraph(paragraph, self.max_tokens, self.overlap) {
                let section_kind = if text.trim_start().starts_with('#') {
                    SECTION_TITLE
                } else {
                    SECTION_BODY
                };
                let ordinal = chunks.len();
                let mut chunk = make_chunk(document, ordinal, &text, section_kind);
                chunk
                    .metadata
                    .insert(META_SECTION.to_string(), section_kind.to_string());
                chunks.push(chunk);
            }
        }
    }
}

impl Default for HeadingAwareChunker {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            overlap: 32,
            min_section_tokens: 24,
        }
    }
}

impl Chunker for HeadingAwareChunker {
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        if document.content.trim().is_empty() {
            let mut chunk = make_chunk(document, 0, &document.content, SECTION_BODY);
            chunk
                .metadata
                .insert(META_SECTION.to_string(), SECTION_BODY.to_string());
            return Ok(vec![chunk]);
        }

        // Group lines into sections, opening a new one at each heading.
        let mut sections: Vec<String> = Vec::new();
        let mut current = String::new();
        for line in document.content.lines() {
            if line.trim_start().starts_with('#') && !current.trim().is_empty() {
                sections.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
        if !current.trim().is_empty() {
            sections.push(current);
        }

        // Buffer undersized sections into the next one; the last section
        // flushes whatever remains.
        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let last = sections.len().saturating_sub(1);
        for (i, section) in sections.iter().enumerate() {
            let combined = if buffer.is_empty() {
                section.clone()
            } else {
                format!("{buffer}\n{section}")
            };
            if i < last && count_tokens(&combined) < self.min_section_tokens {
                buffer = combined;
                continue;
            }
            buffer.clear();
            self.emit_section(document, &combined, &mut chunks);
        }
        if !buffer.trim().is_empty() {
            self.emit_section(document, &buffer, &mut chunks);
        }

        if chunks.is_empty() {
            let mut chunk = make_chunk(document, 0, &document.content, SECTION_BODY);
            chunk
                .metadata
                .insert(META_SECTION.to_string(), SECTION_BODY.to_string());
            chunks.push(chunk);
        }
        Ok(chunks)
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn make_chunk(document: &Document, ordinal: usize, content: &str, section: &str) -> Chunk {
    Chunk {
        id: format!("{}-chunk-{ordinal}", document.id),
        document_id: document.id.clone(),
        content: content.to_string(),
        section: section.to_string(),
        ordinal,
        token_count: count_tokens(content),
        metadata: HashMap::new(),
    }
}

fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
}

/// Window a paragraph into token-bounded pieces.
///
/// Paragraphs within `max_tokens` pass through unchanged. Longer ones are
/// re-joined from token windows of size `max_tokens` advancing by
/// `max_tokens - overlap`, so consecutive pieces share `overlap` tokens.
fn window_paragraph(paragraph: &str, max_tokens: usize, overlap: usize) -> Vec<String> {
    let tokens = tokenize(paragraph);
    if tokens.len() <= max_tokens {
        return vec![paragraph.to_string()];
    }

    let step = max_tokens - overlap;
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + max_tokens).min(tokens.len());
        pieces.push(tokens[start..end].join(" "));
        if end >= tokens.len() {
            break;
        }
        start += step;
    }
    pieces
}

/// Merge pieces below `min_tokens` into a neighbor: backward into the
/// predecessor when one exists, forward otherwise.
fn merge_undersized(pieces: Vec<String>, min_tokens: usize) -> Vec<String> {
    if min_tokens == 0 || pieces.len() <= 1 {
        return pieces;
    }

    let mut merged: Vec<String> = Vec::with_capacity(pieces.len());
    let mut pending_forward: Option<String> = None;
    for piece in pieces {
        let piece = match pending_forward.take() {
            Some(prefix) => format!("{prefix}\n\n{piece}"),
            None => piece,
        };
        if count_tokens(&piece) >= min_tokens {
            merged.push(piece);
        } else if let Some(prev) = merged.last_mut() {
            prev.push_str("\n\n");
            prev.push_str(&piece);
        } else {
            pending_forward = Some(piece);
        }
    }
    if let Some(rest) = pending_forward {
        merged.push(rest);
    }
    merged
}

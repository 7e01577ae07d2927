//! Recursive character text splitting

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

use llamadesk_core::config::{CHUNK_OVERLAP_RATIO, PARENT_CHUNK_MULTIPLIER};
use llamadesk_core::{Error, Result};

/// Split points tried in order, coarsest first; `""` splits between characters
pub const TEXT_SEPARATORS: &[&str] = &["\n\n", "\n", ".", "!", "?", ",", " ", ""];

/// Parent/child chunk sizes for one experiment, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub child_chunk_size: usize,
    pub child_overlap: usize,
    pub parent_chunk_size: usize,
    pub parent_overlap: usize,
}

impl ChunkingConfig {
    /// Derive the full configuration from the child chunk size
    pub fn from_child(child_chunk_size: usize) -> Result<Self> {
        if child_chunk_size == 0 {
            return Err(Error::InvalidInput(
                "Chunk size must be at least one character".to_string(),
            ));
        }

        let parent_chunk_size = child_chunk_size * PARENT_CHUNK_MULTIPLIER;
        Ok(Self {
            child_chunk_size,
            child_overlap: overlap_for(child_chunk_size),
            parent_chunk_size,
            parent_overlap: overlap_for(parent_chunk_size),
        })
    }

    pub fn parent_splitter(&self) -> TextSplitter {
        TextSplitter::new(self.parent_chunk_size, self.parent_overlap)
    }

    pub fn child_splitter(&self) -> TextSplitter {
        TextSplitter::new(self.child_chunk_size, self.child_overlap)
    }
}

fn overlap_for(size: usize) -> usize {
    (size as f64 * CHUNK_OVERLAP_RATIO) as usize
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Splits text on the first separator present, recursing into pieces that are
/// still too long, then greedily merges small pieces back up to `chunk_size`
/// with `chunk_overlap` characters carried between neighbours.
///
/// Separators stay attached to the start of the piece that follows them.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: TEXT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `text` into trimmed, non-empty chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }

            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        size = total,
                        chunk_size = self.chunk_size,
                        "created a chunk longer than the configured size"
                    );
                }
                if !window.is_empty() {
                    merged.extend(join_window(&window));
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                        match window.pop_front() {
                            Some(dropped) => total -= char_len(dropped),
                            None => break,
                        }
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        merged.extend(join_window(&window));
        merged
    }
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Split on `separator`, keeping each separator at the start of the next piece
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

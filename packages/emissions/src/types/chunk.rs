//! Bounded-size chunks of report text for model input.

use serde::{Deserialize, Serialize};

/// A bounded slice of segmented report text.
///
/// Chunks are ordered by `index` and stay under the configured character
/// ceiling, except that a chunk holding a table region may exceed it by
/// the segmenter's slack so the table is never split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    /// Position in the chunk sequence (0-based).
    pub index: usize,

    /// Chunk text.
    pub text: String,

    /// Character length of `text`.
    pub char_len: usize,

    /// Whether the chunk contains a detected table region.
    pub has_table: bool,

    /// Pages contributing lines to this chunk, in order of appearance.
    pub pages: Vec<u32>,
}

impl TextChunk {
    /// Create a chunk from text.
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let char_len = text.chars().count();
        Self {
            index,
            text,
            char_len,
            has_table: false,
            pages: Vec::new(),
        }
    }

    /// Mark the chunk as containing a table region.
    pub fn with_table(mut self) -> Self {
        self.has_table = true;
        self
    }

    /// Attach contributing pages.
    pub fn with_pages(mut self, pages: Vec<u32>) -> Self {
        self.pages = pages;
        self
    }

    /// First contributing page, if any; used as the page hint for
    /// extraction provenance.
    pub fn page_hint(&self) -> Option<u32> {
        self.pages.first().copied()
    }
}

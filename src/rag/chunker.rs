//! Text chunking for document processing.
//!
//! Splits a document into overlapping passages of at most `chunk_size`
//! characters. Sizes count Unicode scalar values, never bytes. Each chunk after
//! the first starts exactly `chunk_overlap` characters before the end of its
//! predecessor, so consecutive chunks share an `chunk_overlap`-long
//! suffix/prefix and together cover the whole input.
//!
//! Chunk ends prefer natural breakpoints, tried in order: paragraph break, line
//! break, sentence end, space. A breakpoint is only taken from the back half of
//! the window; otherwise the chunk is cut hard at `chunk_size`.

use crate::types::{AppError, Result};

/// Breakpoints in order of preference. A chunk ends right after the separator.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// A contiguous slice of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk text.
    pub text: String,
    /// Position of the chunk within its document, starting at 0.
    pub index: usize,
    /// Character offset of the first character in the document.
    pub start: usize,
}

impl TextChunk {
    /// Number of characters in the chunk.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Character-based splitter with fixed overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// Create a chunker.
    ///
    /// # Errors
    ///
    /// `Configuration` unless `chunk_size > 0` and `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::Configuration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into chunks. Empty input yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        if total == 0 {
            return chunks;
        }

        let mut start = 0;
        loop {
            let hard_end = (start + self.chunk_size).min(total);
            let end = if hard_end == total {
                total
            } else {
                self.break_point(&chars, start, hard_end)
            };

            chunks.push(TextChunk {
                text: chars[start..end].iter().collect(),
                index: chunks.len(),
                start,
            });

            if end == total {
                break;
            }
            start = end - self.chunk_overlap;
        }

        chunks
    }

    /// End position for a chunk starting at `start`, at most `hard_end`.
    ///
    /// The result is always greater than `start + chunk_overlap`, so the next
    /// chunk starts strictly after this one.
    fn break_point(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let min_end = start + (self.chunk_size / 2).max(self.chunk_overlap + 1);

        for separator in SEPARATORS {
            let sep: Vec<char> = separator.chars().collect();
            let mut end = hard_end;
            while end >= min_end && end >= start + sep.len() {
                if chars[end - sep.len()..end] == sep[..] {
                    return end;
                }
                end -= 1;
            }
        }

        hard_end
    }
}

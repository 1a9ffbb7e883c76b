//! Fixed-window character chunker.
//!
//! Splits text into [`ChunkRecord`]s of at most `chunk_size` characters,
//! with consecutive windows sharing `chunk_overlap` characters. Windows
//! are measured in Unicode scalar values, never bytes, so a boundary
//! can fall mid-word but never mid-character.
//!
//! # Algorithm
//!
//! 1. Collect the byte offset of every character.
//! 2. Emit the window `[start, min(start + chunk_size, len))`.
//! 3. Stop once a window reaches the end of the text; otherwise advance
//!    `start` by `chunk_size - chunk_overlap`.
//!
//! With `chunk_overlap = 0` a text of `L` characters yields exactly
//! `ceil(L / chunk_size)` chunks whose concatenation is the input.
//! Empty input yields no chunks.
//!
//! # Example
//!
//! ```rust
//! use content_rag_core::chunk::Chunker;
//!
//! let chunker = Chunker::new(4, 0).unwrap();
//! assert_eq!(chunker.split("abcdefghij"), vec!["abcd", "efgh", "ij"]);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{RagError, Result};
use crate::models::Metadata;

/// Default window size, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive windows, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 0;

/// A storage-level slice of a content unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Fresh UUID, unique per stored chunk.
    pub id: String,
    /// Position of this chunk within its content unit, starting at 0.
    pub index: usize,
    pub text: String,
    /// SHA-256 of `text`, used by stores to reuse cached embeddings.
    pub hash: String,
    pub metadata: Metadata,
}

/// Deterministic sliding-window splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    /// Requires `chunk_size > 0` and `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::invalid_input("chunk_size must be > 0"));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::invalid_input(format!(
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

    /// Split `text` into ordered windows.
    pub fn split(&self, text: &str) -> Vec<String> {
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = offsets.len() - 1;
        if char_count == 0 {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut pieces = Vec::with_capacity(char_count.div_ceil(step));
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(char_count);
            pieces.push(text[offsets[start]..offsets[end]].to_string());
            if end == char_count {
                break;
            }
            start += step;
        }
        pieces
    }

    /// Split `text` and attach a copy of `metadata` to every chunk.
    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<ChunkRecord> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(index, piece)| make_chunk(index, piece, metadata))
            .collect()
    }
}

/// Create a single [`ChunkRecord`] with a UUID and SHA-256 content hash.
fn make_chunk(index: usize, text: String, metadata: &Metadata) -> ChunkRecord {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    ChunkRecord {
        id: Uuid::new_v4().to_string(),
        index,
        text,
        hash,
        metadata: metadata.clone(),
    }
}

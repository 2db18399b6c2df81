use serde::Serialize;

use crate::error::KbError;

pub const DEFAULT_CHUNK_SIZE: usize = 400;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Token window used to split a document; `overlap < size` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkWindow {
    size: usize,
    overlap: usize,
}

impl ChunkWindow {
    pub fn new(size: usize, overlap: usize) -> Result<Self, KbError> {
        if size == 0 {
            return Err(KbError::Validation(
                "chunk size must be at least one token".to_string(),
            ));
        }
        if overlap >= size {
            return Err(KbError::Validation(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(self) -> usize {
        self.size
    }

    pub fn overlap(self) -> usize {
        self.overlap
    }

    pub fn stride(self) -> usize {
        self.size - self.overlap
    }
}

impl Default for ChunkWindow {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Splits whitespace tokens into overlapping windows.
///
/// The last window is the first one that reaches the final token, so no chunk is
/// made only of tokens already covered by its predecessor.
pub fn chunk_text(text: &str, window: ChunkWindow) -> Vec<String> {
    let tokens = text.split_whitespace().collect::<Vec<&str>>();
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + window.size).min(tokens.len());
        chunks.push(tokens[start..end].join(" "));
        if end == tokens.len() {
            break;
        }
        start += window.stride();
    }
    chunks
}

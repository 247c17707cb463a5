//! Fixed-size overlapping text chunker.
//!
//! Splits extracted text into windows of at most `chunk_size` characters,
//! each starting `chunk_size - chunk_overlap` characters after the previous
//! one. Sizes count Unicode scalar values, so a window never cuts through a
//! multi-byte character.
//!
//! Every chunk carries a SHA-256 hash of its text. Chunking is a pure
//! function of `(text, chunk_size, chunk_overlap)`.

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Default window length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default number of characters shared by consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Split text into overlapping windows.
///
/// Consecutive chunks share exactly `chunk_overlap` characters; only the
/// final chunk may be shorter than `chunk_size`. Empty input yields no
/// chunks. Callers must ensure `chunk_overlap < chunk_size`; the step is
/// clamped to one character otherwise.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);

    let mut chunks = Vec::with_capacity(chars.len() / step + 1);
    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    loop {
        let end = (start + chunk_size).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        chunks.push(make_chunk(chunk_index, start, piece));

        if end == chars.len() {
            break;
        }
        start += step;
        chunk_index += 1;
    }

    chunks
}

fn make_chunk(index: i64, start: usize, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        chunk_index: index,
        start,
        text,
        hash,
    }
}

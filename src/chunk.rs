//! Overlapping sliding-window text chunker.
//!
//! Splits document text into character-window chunks sized for embedding.
//! Consecutive chunks share `overlap` characters so that sentences straddling
//! a window edge still land intact in at least one chunk.
//!
//! # Algorithm
//!
//! 1. Text no longer than `chunk_size` is returned whole, as a single chunk.
//! 2. Otherwise slide a window of `chunk_size` over the text. Before cutting,
//!    if the character just past the window end is not whitespace or
//!    punctuation, pull the cut back to the last space inside the window so
//!    words are not split. With no space to pull back to, the hard cut stands.
//! 3. Each emitted chunk is trimmed of surrounding whitespace.
//! 4. The next window starts `overlap` characters before the previous cut,
//!    and always at least one character past the previous start — the loop
//!    can never stall, even against pathological inputs.
//!
//! `overlap >= chunk_size` (or a zero `chunk_size`) is an input-validation
//! error, rejected up front as [`RetrievalError::InvalidChunkConfig`].
//!
//! Window arithmetic is in bytes, snapped to UTF-8 character boundaries, so
//! multibyte text never produces an out-of-boundary slice.

use crate::error::RetrievalError;

/// Characters after a window end that make the cut acceptable as-is.
const CUT_BOUNDARY: [char; 5] = [' ', '\n', '\t', '.', ','];

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// Returns chunks in document order; the chunk at position `i` has chunk
/// index `i`. Restartable and finite — the same input always yields the
/// same output.
///
/// # Errors
///
/// [`RetrievalError::InvalidChunkConfig`] when `chunk_size == 0` or
/// `overlap >= chunk_size`.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, RetrievalError> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(RetrievalError::InvalidChunkConfig {
            chunk_size,
            overlap,
        });
    }

    if text.len() <= chunk_size {
        return Ok(vec![text.to_string()]);
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        let mut end = snap_to_char_boundary(text, (start + chunk_size).min(text.len()));
        // A tiny window over a wide multibyte char can snap back to `start`;
        // widen it to the next boundary so the window is never empty.
        if end <= start {
            end = next_char_boundary(text, start + 1);
        }

        if end < text.len() {
            let next_char = text[end..].chars().next().unwrap_or(' ');
            if !CUT_BOUNDARY.contains(&next_char) {
                if let Some(last_space) = text[start..end].rfind(' ') {
                    if last_space > 0 {
                        end = start + last_space;
                    }
                }
            }
        }

        chunks.push(text[start..end].trim().to_string());

        if end >= text.len() {
            break;
        }

        let mut next_start = snap_to_char_boundary(text, end.saturating_sub(overlap));
        if next_start <= start {
            next_start = next_char_boundary(text, start + 1);
        }
        start = next_start;
    }

    Ok(chunks)
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Snap a byte index forward to the nearest valid UTF-8 char boundary.
fn next_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

//! Splitting document text into search chunks.
//!
//! A document that fits in one chunk is kept whole. Longer documents are cut
//! into windows of at most `max_chunk_size` bytes, each ending at the last
//! sentence boundary inside the window, else the last paragraph break, else
//! the last whitespace, else the last character boundary. Trimmed pieces of
//! [`MIN_CHUNK_LEN`] bytes or fewer are dropped.

use std::sync::LazyLock;

use regex::Regex;

/// Pieces this short or shorter are not worth indexing on their own.
pub const MIN_CHUNK_LEN: usize = 100;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s").expect("Invalid regex pattern"));

/// Split `content` into chunks of at most `max_chunk_size` bytes.
#[must_use]
pub fn chunk_text(content: &str, max_chunk_size: usize) -> Vec<String> {
    let content = content.trim();
    if content.is_empty() {
        return Vec::new();
    }
    if content.len() <= max_chunk_size {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < content.len() {
        let end = next_break(content, start, max_chunk_size);
        let piece = content[start..end].trim();
        if piece.len() > MIN_CHUNK_LEN {
            chunks.push(piece.to_string());
        }
        start = end;
    }
    chunks
}

/// End of the chunk starting at `start`; always greater than `start`.
fn next_break(content: &str, start: usize, max_chunk_size: usize) -> usize {
    let limit = floor_char_boundary(content, (start + max_chunk_size).min(content.len()));
    if limit >= content.len() {
        return content.len();
    }
    if limit <= start {
        return ceil_char_boundary(content, start + 1);
    }

    let window = &content[start..limit];
    if let Some(found) = SENTENCE_END.find_iter(window).last() {
        return start + found.start() + 1;
    }
    if let Some(pos) = window.rfind("\n\n").filter(|&pos| pos > 0) {
        return start + pos + 2;
    }
    if let Some(pos) = window.rfind(char::is_whitespace).filter(|&pos| pos > 0) {
        return start + pos;
    }
    limit
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index.min(s.len())
}

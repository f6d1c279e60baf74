//! Paragraph-boundary text splitter for dataset loading.
//!
//! # Algorithm
//!
//! 1. Split text on `\n\n` paragraph boundaries.
//! 2. Accumulate paragraphs into a buffer until adding the next one would
//!    exceed `max_chars`.
//! 3. When exceeded, flush the buffer and start a new piece.
//! 4. A single paragraph longer than `max_chars` is hard-split at the last
//!    newline or space inside the window, or mid-word if there is none.
//!
//! Lengths are counted in characters, never bytes.

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Empty or whitespace-only text yields no pieces.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }
        let para_chars = trimmed.chars().count();

        let would_be = if buf.is_empty() {
            para_chars
        } else {
            buf_chars + 2 + para_chars
        };
        if would_be > max_chars && !buf.is_empty() {
            pieces.push(std::mem::take(&mut buf));
            buf_chars = 0;
        }

        if para_chars > max_chars {
            pieces.extend(hard_split(trimmed, max_chars));
            continue;
        }

        if !buf.is_empty() {
            buf.push_str("\n\n");
            buf_chars += 2;
        }
        buf.push_str(trimmed);
        buf_chars += para_chars;
    }

    if !buf.is_empty() {
        pieces.push(buf);
    }
    pieces
}

fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let window_end = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let cut = if window_end < remaining.len() {
            remaining[..window_end]
                .rfind(['\n', ' '])
                .filter(|&pos| pos > 0)
                .map(|pos| pos + 1)
                .unwrap_or(window_end)
        } else {
            window_end
        };
        let piece = remaining[..cut].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[cut..];
    }
    out
}

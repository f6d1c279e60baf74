//! Content fingerprints for cross-source duplicate detection.
//!
//! A fingerprint is the SHA-256 of the first [`FINGERPRINT_CHARS`]
//! characters of a document's content. Two documents with the same
//! fingerprint are treated as the same logical result no matter which
//! index returned them.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::models::Document;

/// Number of leading characters that participate in the fingerprint.
pub const FINGERPRINT_CHARS: usize = 2000;

/// Hex-encoded SHA-256 digest identifying a document's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn of_text(text: &str) -> Self {
        let head = truncate_chars(text, FINGERPRINT_CHARS);
        let digest = Sha256::digest(head.as_bytes());
        Self(hex::encode(digest))
    }

    pub fn of_document(doc: &Document) -> Self {
        Self::of_text(&doc.content)
    }

    /// Fingerprint raw bytes of unknown encoding.
    ///
    /// Invalid UTF-8 sequences are replaced before truncation.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self::of_text(&String::from_utf8_lossy(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Return at most `max_chars` leading characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

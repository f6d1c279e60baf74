//! Display helpers for documents and logged records.
//!
//! Metadata arrives from many datasets with no fixed schema, so values
//! are looked up through fixed priority lists of known keys instead of
//! assuming any one shape.

use serde_json::{Map, Value};

use crate::models::PROVENANCE_KEY;

const PATH_KEYS: &[&str] = &["path", "filename", "id"];
const DATASET_KEYS: &[&str] = &["dataset", "source", "source_name"];
const ORIGIN_KEYS: &[&str] = &[PROVENANCE_KEY, "origin"];

/// First non-empty value among `keys`, rendered as text.
///
/// Strings are returned as-is; other JSON values use their serialized
/// form. `null` and empty strings count as absent.
pub fn first_field(metadata: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match metadata.get(*k) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    })
}

/// Compact title: `path [dataset] ‹origin›`.
pub fn doc_title(metadata: &Map<String, Value>) -> String {
    let mut title = first_field(metadata, PATH_KEYS).unwrap_or_else(|| "(unknown)".to_string());
    if let Some(dataset) = first_field(metadata, DATASET_KEYS) {
        title.push_str(&format!(" [{}]", dataset));
    }
    if let Some(origin) = first_field(metadata, ORIGIN_KEYS) {
        title.push_str(&format!(" ‹{}›", origin));
    }
    title
}

/// Single-line excerpt of at most `max_chars` characters.
pub fn one_line_preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let mut cut: String = flat.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}

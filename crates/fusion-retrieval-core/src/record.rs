//! Retrieval records: the audit artifact written once per retrieval.
//!
//! Serialized as one JSON object with exactly the fields
//! `ts, query, result_count, by_source, docs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::fingerprint::truncate_chars;
use crate::models::Document;

/// Maximum characters of content kept in a logged preview.
pub const PREVIEW_CHARS: usize = 2000;

/// A logged copy of one returned document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocPreview {
    pub content_preview: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// One completed retrieval transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRecord {
    pub ts: String,
    pub query: String,
    pub result_count: usize,
    pub by_source: BTreeMap<String, usize>,
    pub docs: Vec<DocPreview>,
}

impl RetrievalRecord {
    /// Build a record for `docs` stamped with the current time.
    pub fn new(query: &str, docs: &[Document]) -> Self {
        Self::at(Utc::now(), query, docs)
    }

    /// Build a record with an explicit timestamp.
    pub fn at(now: DateTime<Utc>, query: &str, docs: &[Document]) -> Self {
        let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
        let previews: Vec<DocPreview> = docs
            .iter()
            .map(|d| {
                *by_source.entry(d.retriever_label().to_string()).or_insert(0) += 1;
                DocPreview {
                    content_preview: truncate_chars(&d.content, PREVIEW_CHARS).to_string(),
                    metadata: d.metadata.clone(),
                }
            })
            .collect();

        Self {
            ts: format_ts(now),
            query: query.to_string(),
            result_count: previews.len(),
            by_source,
            docs: previews,
        }
    }

    /// `result_count == docs.len() == sum(by_source)`.
    pub fn is_consistent(&self) -> bool {
        self.result_count == self.docs.len()
            && self.by_source.values().sum::<usize>() == self.result_count
    }
}

/// Format a timestamp as ISO 8601 with second precision and a `Z` suffix.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

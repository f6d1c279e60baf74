//! Core data models shared by indexes, the combined retriever, and logging.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key naming the labeled index that produced a document.
///
/// Reserved for retrieval bookkeeping; downstream consumers must not
/// treat it as domain data.
pub const PROVENANCE_KEY: &str = "_retriever";

/// A unit of retrieved content: text body plus free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }

    /// Builder-style metadata insert.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Label of the index that produced this document, or `""` if untagged.
    pub fn retriever_label(&self) -> &str {
        self.metadata
            .get(PROVENANCE_KEY)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Record which labeled index produced this document.
    ///
    /// Only the provenance key is touched; content stays as retrieved.
    pub fn tag_provenance(&mut self, label: &str) {
        self.metadata
            .insert(PROVENANCE_KEY.to_string(), Value::String(label.to_string()));
    }
}

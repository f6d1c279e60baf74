//! Similarity index abstraction.
//!
//! The [`SimilarityIndex`] trait is the only capability the combined
//! retriever needs from a dataset: ranked documents for a query. Real
//! deployments back it with a vector store; [`memory::InMemoryIndex`] is
//! the bundled implementation used by the CLI and tests.
//!
//! Implementations must be `Send + Sync` so a retriever can poll all of
//! its members concurrently.

pub mod memory;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::Document;

/// Per-index search tuning, fixed when the index joins a retriever.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchParams {
    /// Number of documents to return.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Candidate pool size before diversity selection. `None` lets the
    /// index choose.
    #[serde(default)]
    pub fetch_k: Option<usize>,
    /// MMR lambda in `[0.0, 1.0]`: `1.0` is pure relevance, `0.0` pure
    /// diversity.
    #[serde(default = "default_diversity")]
    pub diversity: f32,
}

fn default_k() -> usize {
    10
}
fn default_diversity() -> f32 {
    0.7
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            k: default_k(),
            fetch_k: None,
            diversity: default_diversity(),
        }
    }
}

impl SearchParams {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    pub fn with_fetch_k(mut self, fetch_k: usize) -> Self {
        self.fetch_k = Some(fetch_k);
        self
    }

    pub fn with_diversity(mut self, diversity: f32) -> Self {
        self.diversity = diversity;
        self
    }

    /// Candidate pool size: explicit `fetch_k`, else `max(k * 4, 20)`.
    /// Never smaller than `k`.
    pub fn effective_fetch_k(&self) -> usize {
        self.fetch_k
            .unwrap_or_else(|| (self.k * 4).max(20))
            .max(self.k)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.diversity) {
            bail!("diversity must be in [0.0, 1.0], got {}", self.diversity);
        }
        Ok(())
    }
}

/// A source of ranked documents for a query.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use fusion_retrieval_core::{Document, SearchParams, SimilarityIndex};
///
/// struct Fixed(Vec<Document>);
///
/// #[async_trait]
/// impl SimilarityIndex for Fixed {
///     async fn search(&self, _query: &str, params: &SearchParams) -> Result<Vec<Document>> {
///         Ok(self.0.iter().take(params.k).cloned().collect())
///     }
/// }
/// ```
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Return up to `params.k` documents ranked by relevance to `query`.
    ///
    /// May fail; the combined retriever treats a failure as an empty
    /// contribution.
    async fn search(&self, query: &str, params: &SearchParams) -> Result<Vec<Document>>;
}

/// A similarity index paired with its label and search parameters.
#[derive(Clone)]
pub struct LabeledIndex {
    pub label: String,
    pub index: Arc<dyn SimilarityIndex>,
    pub params: SearchParams,
}

impl LabeledIndex {
    pub fn new(label: impl Into<String>, index: Arc<dyn SimilarityIndex>) -> Self {
        Self {
            label: label.into(),
            index,
            params: SearchParams::default(),
        }
    }

    pub fn with_params(mut self, params: SearchParams) -> Self {
        self.params = params;
        self
    }

    /// Pair indexes with labels, synthesizing `r0`, `r1`, … when `labels`
    /// is empty.
    pub fn zip(labels: Vec<String>, indexes: Vec<Arc<dyn SimilarityIndex>>) -> Result<Vec<Self>> {
        if !labels.is_empty() && labels.len() != indexes.len() {
            bail!(
                "label count ({}) does not match index count ({})",
                labels.len(),
                indexes.len()
            );
        }
        let labels = if labels.is_empty() {
            (0..indexes.len()).map(|i| format!("r{}", i)).collect()
        } else {
            labels
        };
        Ok(labels
            .into_iter()
            .zip(indexes)
            .map(|(label, index)| Self::new(label, index))
            .collect())
    }
}

impl std::fmt::Debug for LabeledIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabeledIndex")
            .field("label", &self.label)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

//! In-memory [`SimilarityIndex`] with maximal marginal relevance.
//!
//! Documents and their vectors live in a `Vec` behind `std::sync::RwLock`.
//! Search is brute-force cosine similarity over every stored vector,
//! followed by MMR selection over the top `fetch_k` candidates.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::models::Document;

use super::{SearchParams, SimilarityIndex};

struct StoredDoc {
    doc: Document,
    vector: Vec<f32>,
}

/// In-memory vector index for one dataset.
pub struct InMemoryIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    docs: RwLock<Vec<StoredDoc>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            docs: RwLock::new(Vec::new()),
        }
    }

    /// Embed and store documents. Returns the number added.
    pub fn add_documents(&self, docs: Vec<Document>) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let texts: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
        let vectors = self.embedder.embed(&texts)?;
        if vectors.len() != docs.len() {
            return Err(anyhow!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                docs.len()
            ));
        }
        let added = docs.len();
        let mut stored = self.write();
        stored.extend(
            docs.into_iter()
                .zip(vectors)
                .map(|(doc, vector)| StoredDoc { doc, vector }),
        );
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<StoredDoc>> {
        self.docs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<StoredDoc>> {
        self.docs.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SimilarityIndex for InMemoryIndex {
    async fn search(&self, query: &str, params: &SearchParams) -> Result<Vec<Document>> {
        if params.k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed(&[query])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector for query"))?;

        let stored = self.read();
        if stored.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<(usize, f32)> = stored
            .iter()
            .enumerate()
            .map(|(i, sd)| (i, cosine_similarity(&query_vec, &sd.vector)))
            .collect();
        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        candidates.truncate(params.effective_fetch_k());

        let vectors: Vec<&[f32]> = candidates
            .iter()
            .map(|(i, _)| stored[*i].vector.as_slice())
            .collect();
        let relevance: Vec<f32> = candidates.iter().map(|(_, s)| *s).collect();
        let picked = mmr_select(&relevance, &vectors, params.k, params.diversity);

        Ok(picked
            .into_iter()
            .map(|c| stored[candidates[c].0].doc.clone())
            .collect())
    }
}

/// Maximal marginal relevance selection.
///
/// `relevance[i]` is candidate `i`'s similarity to the query and
/// `vectors[i]` its embedding. Each step picks the candidate maximizing
/// `λ·relevance − (1−λ)·max_sim_to_selected`. Returns candidate indices in
/// selection order; ties go to the lower index.
pub fn mmr_select(relevance: &[f32], vectors: &[&[f32]], k: usize, lambda: f32) -> Vec<usize> {
    let n = relevance.len().min(vectors.len());
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(n));
    let mut remaining: Vec<usize> = (0..n).collect();

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (pos, &cand) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| cosine_similarity(vectors[cand], vectors[s]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };
            let score = lambda * relevance[cand] - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }
        selected.push(remaining.remove(best_pos));
    }

    selected
}

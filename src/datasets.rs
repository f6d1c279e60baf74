//! Dataset loading: files on disk → documents → in-memory index.
//!
//! Each configured dataset is a directory (or a single file). Plain text
//! files become one text each; every non-empty `.jsonl` line becomes its
//! own text addressed as `<relpath>:<line>`. Texts are prefixed with their
//! path and dataset name so both are searchable, then split on paragraph
//! boundaries.

use anyhow::{Context, Result};
use fusion_retrieval_core::embedding::EmbeddingProvider;
use fusion_retrieval_core::index::memory::InMemoryIndex;
use fusion_retrieval_core::Document;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::chunk::split_text;
use crate::config::DatasetConfig;

/// One addressable text read from a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceText {
    pub relpath: String,
    pub text: String,
}

/// Read every matching text under the dataset root, sorted by path.
///
/// A missing root is not an error: the dataset is simply empty.
pub fn scan_dataset(name: &str, ds: &DatasetConfig) -> Result<Vec<SourceText>> {
    let root = &ds.root;
    if !root.exists() {
        warn!(dataset = name, root = %root.display(), "dataset root does not exist; using empty dataset");
        return Ok(Vec::new());
    }

    if root.is_file() {
        let rel = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        return read_file(root, &rel);
    }

    let include_set = build_globset(&ds.include_globs)?;
    let mut excludes = vec!["**/.git/**".to_string()];
    excludes.extend(ds.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();
        if exclude_set.is_match(&rel) || !include_set.is_match(&rel) {
            continue;
        }
        files.push((path.to_path_buf(), rel));
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));

    let mut texts = Vec::new();
    for (path, rel) in files {
        texts.extend(read_file(&path, &rel)?);
    }
    Ok(texts)
}

fn read_file(path: &Path, rel: &str) -> Result<Vec<SourceText>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let body = String::from_utf8_lossy(&bytes);

    let is_jsonl = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("jsonl"))
        .unwrap_or(false);
    if !is_jsonl {
        return Ok(vec![SourceText {
            relpath: rel.to_string(),
            text: body.into_owned(),
        }]);
    }

    Ok(body
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| SourceText {
            relpath: format!("{}:{}", rel, i),
            text: line.trim().to_string(),
        })
        .collect())
}

/// Turn source texts into chunked, annotated documents.
pub fn to_documents(texts: &[SourceText], source_name: &str, max_chars: usize) -> Vec<Document> {
    let mut docs = Vec::new();
    for st in texts {
        let payload = format!(
            "TITLE: {}\nDATASET: {}\n\n{}",
            st.relpath, source_name, st.text
        );
        for (i, piece) in split_text(&payload, max_chars).into_iter().enumerate() {
            docs.push(
                Document::new(piece)
                    .with_meta("path", st.relpath.as_str())
                    .with_meta("dataset", source_name)
                    .with_meta("chunk_index", i as u64),
            );
        }
    }
    docs
}

/// Load one dataset into a fresh in-memory index.
pub fn build_index(
    name: &str,
    ds: &DatasetConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<InMemoryIndex> {
    let source_name = ds.source_name.as_deref().unwrap_or(name);
    let texts = scan_dataset(name, ds)?;
    let docs = to_documents(&texts, source_name, ds.max_chars);

    let index = InMemoryIndex::new(embedder);
    let added = index
        .add_documents(docs)
        .with_context(|| format!("Failed to index dataset '{}'", name))?;
    info!(dataset = name, texts = texts.len(), chunks = added, "dataset loaded");
    Ok(index)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

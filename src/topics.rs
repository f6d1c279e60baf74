//! Topic wiring: configured datasets → labeled indexes → combined retrievers.
//!
//! Every topic is a [`CombinedRetriever`] over its member datasets, using
//! each dataset's name as its label. All topics share one durable log and
//! one telemetry feed. A dataset used by several topics is loaded once.

use anyhow::{Context, Result};
use fusion_retrieval_core::embedding::{EmbeddingProvider, HashingEmbedder};
use fusion_retrieval_core::sink::RecordSink;
use fusion_retrieval_core::{CombinedRetriever, LabeledIndex, SimilarityIndex, TelemetryFeed};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::datasets::build_index;
use crate::retrieval_log::JsonlLog;

/// All configured topics, ready to query.
pub struct Topics {
    retrievers: BTreeMap<String, CombinedRetriever>,
    feed: TelemetryFeed,
    log: Option<Arc<JsonlLog>>,
}

impl Topics {
    /// Load datasets and build every topic from `config`.
    pub fn build(config: &Config) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(HashingEmbedder::new(config.embedding.dims));
        let mut indexes: BTreeMap<String, Arc<dyn SimilarityIndex>> = BTreeMap::new();
        for topic in config.topics.values() {
            for name in &topic.datasets {
                if indexes.contains_key(name) {
                    continue;
                }
                let ds = config
                    .datasets
                    .get(name)
                    .with_context(|| format!("unknown dataset '{}'", name))?;
                let index = build_index(name, ds, embedder.clone())?;
                indexes.insert(name.clone(), Arc::new(index));
            }
        }
        Self::with_indexes(config, &indexes)
    }

    /// Build topics over already-constructed indexes, keyed by dataset name.
    ///
    /// Search parameters still come from each dataset's config entry.
    pub fn with_indexes(
        config: &Config,
        indexes: &BTreeMap<String, Arc<dyn SimilarityIndex>>,
    ) -> Result<Self> {
        let feed = TelemetryFeed::new(config.telemetry.capacity);
        let log = if config.log.enabled {
            Some(Arc::new(
                JsonlLog::new(&config.log.path).with_lock_timeout(config.log.lock_timeout()),
            ))
        } else {
            None
        };

        let mut retrievers = BTreeMap::new();
        for (topic_name, topic) in &config.topics {
            let mut members = Vec::with_capacity(topic.datasets.len());
            for ds_name in &topic.datasets {
                let index = indexes
                    .get(ds_name)
                    .with_context(|| format!("no index loaded for dataset '{}'", ds_name))?;
                let params = config
                    .datasets
                    .get(ds_name)
                    .map(|d| d.search.clone())
                    .unwrap_or_default();
                members.push(LabeledIndex::new(ds_name.as_str(), index.clone()).with_params(params));
            }

            let mut retriever = CombinedRetriever::new(members, topic.limit)
                .with_context(|| format!("invalid topic '{}'", topic_name))?
                .with_preferred_label(config.retrieval.preferred())
                .with_trigger_tokens(config.retrieval.trigger_tokens.clone())
                .with_fan_out(config.retrieval.fan_out)
                .with_feed(feed.clone());
            if let Some(log) = &log {
                let sink: Arc<dyn RecordSink> = log.clone();
                retriever = retriever.with_sink(sink);
            }
            retrievers.insert(topic_name.clone(), retriever);
        }

        Ok(Self {
            retrievers,
            feed,
            log,
        })
    }

    pub fn get(&self, topic: &str) -> Option<&CombinedRetriever> {
        self.retrievers.get(topic)
    }

    pub fn names(&self) -> Vec<&str> {
        self.retrievers.keys().map(String::as_str).collect()
    }

    pub fn feed(&self) -> &TelemetryFeed {
        &self.feed
    }

    pub fn log(&self) -> Option<&JsonlLog> {
        self.log.as_deref()
    }
}

/// Print configured topics without loading any dataset.
pub fn list_topics(config: &Config) -> Result<()> {
    if config.topics.is_empty() {
        println!("No topics configured.");
        return Ok(());
    }
    println!("{:<12} {:<6} DATASETS", "TOPIC", "LIMIT");
    for (name, topic) in &config.topics {
        println!("{:<12} {:<6} {}", name, topic.limit, topic.datasets.join(", "));
    }
    Ok(())
}

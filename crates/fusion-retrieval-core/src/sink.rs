//! Durable record sink abstraction.
//!
//! The core never touches the filesystem. Whatever persists retrieval
//! records (the application's JSONL log, a test collector) implements
//! [`RecordSink`]. Sink errors are reported to the caller of `append`
//! and swallowed by the combined retriever.
//!
//! `append` is async so that implementations which wait on files or
//! locks can move that work off the executor thread.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

use crate::record::RetrievalRecord;

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist one record.
    async fn append(&self, record: &RetrievalRecord) -> Result<()>;
}

/// Sink that keeps records in memory, oldest first.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<RetrievalRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RetrievalRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn append(&self, record: &RetrievalRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

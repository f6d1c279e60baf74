//! # Fusion Retrieval Core
//!
//! Runtime-agnostic logic for Fusion Retrieval: the document model,
//! the similarity index abstraction, cross-source deduplication and
//! balancing, retrieval records, and the in-memory telemetry feed.
//!
//! This crate contains no tokio, filesystem I/O, or other runtime
//! dependencies. Durable logging is reached through the
//! [`sink::RecordSink`] trait, implemented by the application crate.

pub mod balance;
pub mod combined;
pub mod embedding;
pub mod fingerprint;
pub mod index;
pub mod models;
pub mod record;
pub mod render;
pub mod sink;
pub mod telemetry;

pub use combined::{CombinedRetriever, FanOut, RetrievalReport};
pub use index::{LabeledIndex, SearchParams, SimilarityIndex};
pub use models::{Document, PROVENANCE_KEY};
pub use record::RetrievalRecord;
pub use telemetry::TelemetryFeed;

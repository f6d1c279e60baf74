//! # Fusion Retrieval
//!
//! Combined retrieval over several labeled similarity indexes, with an
//! audit trail.
//!
//! A *topic* groups datasets that answer the same kind of question. One
//! query against a topic fans out to every member dataset, merges the
//! answers, removes duplicate content, and hands back a short list that
//! mixes sources fairly. Every retrieval is appended to a JSONL log and
//! kept in an in-memory feed of recent activity.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────────┐
//! │  Datasets   │──▶│ InMemoryIndex│──▶│ CombinedRetriever │
//! │ dirs / jsonl│   │  (per label) │   │ dedup + balance   │
//! └─────────────┘   └──────────────┘   └─────────┬─────────┘
//!                                                │
//!                               ┌────────────────┤
//!                               ▼                ▼
//!                         ┌──────────┐    ┌─────────────┐
//!                         │  JSONL   │    │  Telemetry  │
//!                         │   log    │    │    feed     │
//!                         └──────────┘    └─────────────┘
//! ```
//!
//! The retrieval logic itself lives in `fusion-retrieval-core`; this
//! crate adds file I/O, configuration, and the `fusion` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`chunk`] | Paragraph-boundary text splitting |
//! | [`datasets`] | Dataset scanning and index building |
//! | [`retrieval_log`] | File-backed JSONL retrieval log |
//! | [`topics`] | Topic → combined retriever wiring |
//! | [`search`] | `fusion search` |
//! | [`log_cmd`] | `fusion log` |
//! | [`logging`] | Tracing subscriber setup |

pub mod chunk;
pub mod config;
pub mod datasets;
pub mod log_cmd;
pub mod logging;
pub mod retrieval_log;
pub mod search;
pub mod topics;

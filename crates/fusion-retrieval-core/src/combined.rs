//! Combined retriever: fan-out, dedup, balance, log.
//!
//! A [`CombinedRetriever`] owns the labeled indexes for one topic. Each
//! call to [`retrieve`](CombinedRetriever::retrieve) runs:
//!
//! ```text
//! query ──▶ fan-out (tag each member's docs with its label)
//!       ──▶ dedup by content fingerprint (preferred label wins)
//!       ──▶ boost + round-robin to `limit`
//!       ──▶ record to sink + telemetry feed
//!       ──▶ documents
//! ```
//!
//! Member failures and sink failures are logged and swallowed. The only
//! error a retriever ever returns comes from construction.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use futures::future::join_all;
use futures::FutureExt;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::balance::{balanced_slice, dedup, wants_boost, DEFAULT_TRIGGER_TOKENS};
use crate::index::LabeledIndex;
use crate::models::Document;
use crate::record::RetrievalRecord;
use crate::sink::RecordSink;
use crate::telemetry::TelemetryFeed;

/// Default result budget per query.
pub const DEFAULT_LIMIT: usize = 5;

/// Label whose documents win duplicate collisions and receive the boost.
pub const DEFAULT_PREFERRED_LABEL: &str = "query";

/// How member indexes are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    /// Poll every member together; one failure never cancels another.
    #[default]
    Concurrent,
    /// Call members one after another in label order.
    Sequential,
}

/// What one member contributed to a retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberReport {
    pub label: String,
    /// Documents returned before dedup.
    pub returned: usize,
    /// Error text if the member failed.
    pub error: Option<String>,
}

/// Result of [`CombinedRetriever::retrieve_with_report`].
#[derive(Debug, Clone)]
pub struct RetrievalReport {
    pub documents: Vec<Document>,
    pub members: Vec<MemberReport>,
    pub record: RetrievalRecord,
}

struct MemberOutcome {
    label: String,
    result: Result<Vec<Document>>,
}

/// Aggregates several labeled similarity indexes behind one query call.
pub struct CombinedRetriever {
    members: Vec<LabeledIndex>,
    labels: Vec<String>,
    limit: usize,
    preferred_label: Option<String>,
    trigger_tokens: Vec<String>,
    fan_out: FanOut,
    sink: Option<Arc<dyn RecordSink>>,
    feed: Option<TelemetryFeed>,
}

impl CombinedRetriever {
    /// Build a retriever over `members` returning at most `limit` documents.
    ///
    /// Fails if there are no members, labels repeat, or a member's search
    /// parameters are invalid.
    pub fn new(members: Vec<LabeledIndex>, limit: usize) -> Result<Self> {
        if members.is_empty() {
            bail!("a combined retriever needs at least one index");
        }
        let mut seen = HashSet::new();
        for m in &members {
            if !seen.insert(m.label.as_str()) {
                bail!("duplicate retriever label '{}'", m.label);
            }
            m.params
                .validate()
                .with_context(|| format!("invalid search params for '{}'", m.label))?;
        }
        let labels = members.iter().map(|m| m.label.clone()).collect();

        Ok(Self {
            members,
            labels,
            limit,
            preferred_label: Some(DEFAULT_PREFERRED_LABEL.to_string()),
            trigger_tokens: DEFAULT_TRIGGER_TOKENS.iter().map(|t| t.to_string()).collect(),
            fan_out: FanOut::default(),
            sink: None,
            feed: None,
        })
    }

    pub fn with_preferred_label(mut self, label: Option<String>) -> Self {
        self.preferred_label = label;
        self
    }

    pub fn with_trigger_tokens(mut self, tokens: Vec<String>) -> Self {
        self.trigger_tokens = tokens;
        self
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_feed(mut self, feed: TelemetryFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn preferred_label(&self) -> Option<&str> {
        self.preferred_label.as_deref()
    }

    /// Retrieve at most `limit` deduplicated, balanced documents.
    pub async fn retrieve(&self, query: &str) -> Vec<Document> {
        self.retrieve_with_report(query).await.documents
    }

    /// Like [`retrieve`](Self::retrieve), also returning per-member
    /// outcomes and the logged record.
    pub async fn retrieve_with_report(&self, query: &str) -> RetrievalReport {
        let outcomes = self.fan_out(query).await;

        let mut members = Vec::with_capacity(outcomes.len());
        let mut arrived: Vec<Document> = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(docs) => {
                    members.push(MemberReport {
                        label: outcome.label,
                        returned: docs.len(),
                        error: None,
                    });
                    arrived.extend(docs);
                }
                Err(e) => {
                    warn!(label = %outcome.label, error = %e, "retriever member failed; skipping");
                    members.push(MemberReport {
                        label: outcome.label,
                        returned: 0,
                        error: Some(format!("{:#}", e)),
                    });
                }
            }
        }

        let preferred = self.preferred_label.as_deref();
        let unique = dedup(arrived, preferred);
        let boost = wants_boost(query, &self.trigger_tokens);
        let documents = balanced_slice(unique, &self.labels, self.limit, boost, preferred);

        let record = RetrievalRecord::new(query, &documents);
        self.log(&record).await;

        RetrievalReport {
            documents,
            members,
            record,
        }
    }

    async fn fan_out(&self, query: &str) -> Vec<MemberOutcome> {
        match self.fan_out {
            FanOut::Concurrent => {
                join_all(self.members.iter().map(|m| call_member(m, query))).await
            }
            FanOut::Sequential => {
                let mut outcomes = Vec::with_capacity(self.members.len());
                for m in &self.members {
                    outcomes.push(call_member(m, query).await);
                }
                outcomes
            }
        }
    }

    async fn log(&self, record: &RetrievalRecord) {
        debug!(
            query = %record.query,
            result_count = record.result_count,
            by_source = ?record.by_source,
            "retrieval complete"
        );
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.append(record).await {
                warn!(error = %e, "failed to persist retrieval record");
            }
        }
        if let Some(feed) = &self.feed {
            feed.push(record.clone());
        }
    }
}

impl std::fmt::Debug for CombinedRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedRetriever")
            .field("labels", &self.labels)
            .field("limit", &self.limit)
            .field("preferred_label", &self.preferred_label)
            .field("fan_out", &self.fan_out)
            .finish_non_exhaustive()
    }
}

// Tags are applied here, on the member's own vector, before anything
// reaches the shared aggregation buffer. A panicking member is caught
// and reported like any other failure.
async fn call_member(member: &LabeledIndex, query: &str) -> MemberOutcome {
    let search = AssertUnwindSafe(member.index.search(query, &member.params)).catch_unwind();
    let result = match search.await {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("member panicked: {}", panic_message(&*payload))),
    };
    let result = result.map(|mut docs| {
        for d in &mut docs {
            d.tag_provenance(&member.label);
        }
        docs
    });
    MemberOutcome {
        label: member.label.clone(),
        result,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::ContentFingerprint;
    use crate::index::{SearchParams, SimilarityIndex};
    use crate::sink::MemorySink;
    use async_trait::async_trait;

    struct Fixed(Vec<Document>);

    #[async_trait]
    impl SimilarityIndex for Fixed {
        async fn search(&self, _query: &str, _params: &SearchParams) -> Result<Vec<Document>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl SimilarityIndex for Failing {
        async fn search(&self, _query: &str, _params: &SearchParams) -> Result<Vec<Document>> {
            Err(anyhow!("index offline"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl SimilarityIndex for Panicking {
        async fn search(&self, _query: &str, _params: &SearchParams) -> Result<Vec<Document>> {
            panic!("index state corrupted")
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl RecordSink for BrokenSink {
        async fn append(&self, _record: &RetrievalRecord) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    fn fixed(label: &str, contents: &[&str]) -> LabeledIndex {
        LabeledIndex::new(
            label,
            Arc::new(Fixed(contents.iter().map(|c| Document::new(*c)).collect())),
        )
    }

    fn contents(docs: &[Document]) -> Vec<(&str, &str)> {
        docs.iter()
            .map(|d| (d.content.as_str(), d.retriever_label()))
            .collect()
    }

    #[tokio::test]
    async fn test_scenario_cve_cwe_query() {
        let sink = Arc::new(MemorySink::new());
        let retriever = CombinedRetriever::new(
            vec![
                fixed("cve", &["D3"]),
                fixed("cwe", &["D1"]),
                fixed("query", &["D1", "D2"]),
            ],
            2,
        )
        .unwrap()
        .with_sink(sink.clone());

        let docs = retriever.retrieve("where(severity>7)").await;
        assert_eq!(contents(&docs), vec![("D1", "query"), ("D2", "query")]);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].by_source.len(), 1);
        assert_eq!(records[0].by_source.get("query"), Some(&2));
        assert!(records[0].is_consistent());
    }

    #[tokio::test]
    async fn test_preferred_label_wins_regardless_of_order() {
        for members in [
            vec![fixed("a", &["same"]), fixed("query", &["same"])],
            vec![fixed("query", &["same"]), fixed("a", &["same"])],
        ] {
            let retriever = CombinedRetriever::new(members, 5).unwrap();
            let docs = retriever.retrieve("plain question").await;
            assert_eq!(contents(&docs), vec![("same", "query")]);
        }
    }

    #[tokio::test]
    async fn test_partial_failure_tolerance() {
        for fan_out in [FanOut::Concurrent, FanOut::Sequential] {
            let retriever = CombinedRetriever::new(
                vec![
                    fixed("a", &["a1", "a2"]),
                    LabeledIndex::new("broken", Arc::new(Failing)),
                    fixed("b", &["b1"]),
                ],
                10,
            )
            .unwrap()
            .with_fan_out(fan_out);

            let report = retriever.retrieve_with_report("anything").await;
            assert_eq!(
                contents(&report.documents),
                vec![("a1", "a"), ("b1", "b"), ("a2", "a")]
            );
            let broken = &report.members[1];
            assert_eq!(broken.label, "broken");
            assert_eq!(broken.returned, 0);
            assert!(broken.error.as_deref().unwrap_or("").contains("offline"));
        }
    }

    #[tokio::test]
    async fn test_panicking_member_is_isolated() {
        for fan_out in [FanOut::Concurrent, FanOut::Sequential] {
            let sink = Arc::new(MemorySink::new());
            let retriever = Arc::new(
                CombinedRetriever::new(
                    vec![
                        fixed("a", &["a1"]),
                        LabeledIndex::new("b", Arc::new(Panicking)),
                        fixed("c", &["c1"]),
                    ],
                    5,
                )
                .unwrap()
                .with_fan_out(fan_out)
                .with_sink(sink.clone()),
            );

            let r = retriever.clone();
            let report = tokio::spawn(async move { r.retrieve_with_report("q").await })
                .await
                .expect("retrieval task must not panic");
            assert_eq!(contents(&report.documents), vec![("a1", "a"), ("c1", "c")]);
            let b = &report.members[1];
            assert_eq!(b.returned, 0);
            assert!(b.error.as_deref().unwrap_or("").contains("panicked"));
            assert_eq!(sink.records().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_dedup_idempotent_across_calls() {
        let retriever = CombinedRetriever::new(
            vec![fixed("a", &["x", "y", "x"]), fixed("b", &["y", "z"])],
            10,
        )
        .unwrap();
        let first = retriever.retrieve("q").await;
        let second = retriever.retrieve("q").await;
        assert_eq!(first, second);
        let fps: HashSet<ContentFingerprint> =
            first.iter().map(ContentFingerprint::of_document).collect();
        assert_eq!(fps.len(), first.len());
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn test_limit_zero_still_logs() {
        let sink = Arc::new(MemorySink::new());
        let feed = TelemetryFeed::new(10);
        let retriever = CombinedRetriever::new(vec![fixed("a", &["a1"])], 0)
            .unwrap()
            .with_sink(sink.clone())
            .with_feed(feed.clone());

        assert!(retriever.retrieve("q").await.is_empty());
        assert_eq!(sink.records()[0].result_count, 0);
        assert_eq!(feed.get_recent(1)[0].result_count, 0);
    }

    #[tokio::test]
    async fn test_all_members_empty() {
        let retriever =
            CombinedRetriever::new(vec![fixed("a", &[]), fixed("b", &[])], 5).unwrap();
        assert!(retriever.retrieve("q").await.is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let feed = TelemetryFeed::new(10);
        let retriever = CombinedRetriever::new(vec![fixed("a", &["a1"])], 5)
            .unwrap()
            .with_sink(Arc::new(BrokenSink))
            .with_feed(feed.clone());
        let docs = retriever.retrieve("q").await;
        assert_eq!(docs.len(), 1);
        assert_eq!(feed.len(), 1);
    }

    #[tokio::test]
    async fn test_boost_puts_preferred_first() {
        let retriever = CombinedRetriever::new(
            vec![fixed("lcel", &["l1", "l2", "l3"]), fixed("query", &["q1", "q2", "q3"])],
            4,
        )
        .unwrap();

        let boosted = retriever.retrieve("groupby(host)").await;
        assert_eq!(
            contents(&boosted),
            vec![("q1", "query"), ("q2", "query"), ("l1", "lcel"), ("q3", "query")]
        );

        let plain = retriever.retrieve("list hosts").await;
        assert_eq!(
            contents(&plain),
            vec![("l1", "lcel"), ("q1", "query"), ("l2", "lcel"), ("q2", "query")]
        );
    }

    #[tokio::test]
    async fn test_disabled_preference() {
        let retriever = CombinedRetriever::new(
            vec![fixed("a", &["same"]), fixed("query", &["same", "q2"])],
            5,
        )
        .unwrap()
        .with_preferred_label(None);
        let docs = retriever.retrieve("where(x)").await;
        assert_eq!(contents(&docs), vec![("same", "a"), ("q2", "query")]);
    }

    #[tokio::test]
    async fn test_content_untouched_metadata_tagged() {
        let idx = Fixed(vec![Document::new("body").with_meta("path", "p.md")]);
        let retriever =
            CombinedRetriever::new(vec![LabeledIndex::new("cve", Arc::new(idx))], 5).unwrap();
        let docs = retriever.retrieve("q").await;
        assert_eq!(docs[0].content, "body");
        assert_eq!(docs[0].metadata.get("path").and_then(|v| v.as_str()), Some("p.md"));
        assert_eq!(docs[0].retriever_label(), "cve");
    }

    #[test]
    fn test_construction_errors() {
        assert!(CombinedRetriever::new(Vec::new(), 5).is_err());

        let dup = CombinedRetriever::new(vec![fixed("a", &[]), fixed("a", &[])], 5);
        assert!(dup.unwrap_err().to_string().contains("duplicate"));

        let bad = fixed("a", &[]).with_params(SearchParams::new(4).with_diversity(2.0));
        assert!(CombinedRetriever::new(vec![bad], 5).is_err());
    }
}

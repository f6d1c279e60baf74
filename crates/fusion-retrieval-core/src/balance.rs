//! Cross-source deduplication and budget balancing.
//!
//! # Algorithm
//!
//! 1. **Dedup**: walk documents in arrival order keyed by
//!    [`ContentFingerprint`]. The first occurrence fixes the output
//!    position. A later duplicate replaces the kept document only when
//!    its label is the preferred label and the kept one's is not.
//! 2. **Bucket**: split the survivors into per-label FIFO queues,
//!    keeping relative order.
//! 3. **Boost**: if the query contains a trigger token and the
//!    preferred queue is non-empty, take up to [`BOOST_COUNT`] from it.
//! 4. **Round-robin**: visit labels in their configured order, taking
//!    one document per non-empty queue per pass, until `limit` is
//!    reached or every queue is empty.
//!
//! Fairness is in visitation order only. A label that runs out early is
//! skipped on later passes, and a small `limit` can be consumed entirely
//! by the boost.

use std::collections::{HashMap, VecDeque};

use crate::fingerprint::ContentFingerprint;
use crate::models::Document;

/// How many preferred-label documents the boost step may take.
pub const BOOST_COUNT: usize = 2;

/// Query-syntax markers that activate the preferred-label boost.
pub const DEFAULT_TRIGGER_TOKENS: &[&str] = &[
    "lqel",
    "lcel",
    "where(",
    "groupby(",
    "calculate(",
    "icontains",
    "istarts-with",
    "nocase(",
];

/// Remove content duplicates, letting `preferred` win collisions.
pub fn dedup(docs: Vec<Document>, preferred: Option<&str>) -> Vec<Document> {
    let mut slot_of: HashMap<ContentFingerprint, usize> = HashMap::new();
    let mut kept: Vec<Document> = Vec::with_capacity(docs.len());

    for doc in docs {
        let fp = ContentFingerprint::of_document(&doc);
        match slot_of.get(&fp) {
            None => {
                slot_of.insert(fp, kept.len());
                kept.push(doc);
            }
            Some(&slot) => {
                if let Some(pref) = preferred {
                    if doc.retriever_label() == pref && kept[slot].retriever_label() != pref {
                        kept[slot] = doc;
                    }
                }
            }
        }
    }

    kept
}

/// True if the lower-cased query contains any trigger token.
pub fn wants_boost<S: AsRef<str>>(query: &str, triggers: &[S]) -> bool {
    let lowered = query.to_lowercase();
    triggers
        .iter()
        .any(|t| !t.as_ref().is_empty() && lowered.contains(&t.as_ref().to_lowercase()))
}

/// Pick at most `limit` documents fairly across `labels`.
///
/// `labels` fixes the round-robin order. Documents whose label is not in
/// `labels` are visited after the configured ones, in first-seen order.
pub fn balanced_slice(
    docs: Vec<Document>,
    labels: &[String],
    limit: usize,
    boost: bool,
    preferred: Option<&str>,
) -> Vec<Document> {
    let mut order: Vec<String> = labels.to_vec();
    let mut queues: HashMap<String, VecDeque<Document>> = HashMap::new();
    for doc in docs {
        let label = doc.retriever_label().to_string();
        if !order.contains(&label) {
            order.push(label.clone());
        }
        queues.entry(label).or_default().push_back(doc);
    }

    let mut out: Vec<Document> = Vec::with_capacity(limit);
    if limit == 0 {
        return out;
    }

    if boost {
        if let Some(queue) = preferred.and_then(|p| queues.get_mut(p)) {
            for _ in 0..BOOST_COUNT {
                if let Some(doc) = queue.pop_front() {
                    out.push(doc);
                }
                if out.len() >= limit {
                    return out;
                }
            }
        }
    }

    while out.len() < limit {
        let mut took_any = false;
        for label in &order {
            if out.len() >= limit {
                break;
            }
            if let Some(doc) = queues.get_mut(label).and_then(VecDeque::pop_front) {
                out.push(doc);
                took_any = true;
            }
        }
        if !took_any {
            break;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str, label: &str) -> Document {
        let mut d = Document::new(content);
        d.tag_provenance(label);
        d
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn summary(docs: &[Document]) -> Vec<(String, String)> {
        docs.iter()
            .map(|d| (d.content.clone(), d.retriever_label().to_string()))
            .collect()
    }

    #[test]
    fn test_dedup_keeps_first_when_no_preference_involved() {
        let out = dedup(vec![doc("x", "a"), doc("x", "b"), doc("y", "b")], Some("query"));
        assert_eq!(
            summary(&out),
            vec![("x".into(), "a".into()), ("y".into(), "b".into())]
        );
    }

    #[test]
    fn test_dedup_preferred_wins_either_order() {
        let late = dedup(vec![doc("x", "a"), doc("x", "query")], Some("query"));
        assert_eq!(late[0].retriever_label(), "query");

        let early = dedup(vec![doc("x", "query"), doc("x", "a")], Some("query"));
        assert_eq!(early[0].retriever_label(), "query");
        assert_eq!(early.len(), 1);
    }

    #[test]
    fn test_dedup_replacement_keeps_first_position() {
        let out = dedup(
            vec![doc("x", "a"), doc("y", "a"), doc("x", "query")],
            Some("query"),
        );
        assert_eq!(
            summary(&out),
            vec![("x".into(), "query".into()), ("y".into(), "a".into())]
        );
    }

    #[test]
    fn test_dedup_without_preference() {
        let out = dedup(vec![doc("x", "a"), doc("x", "query")], None);
        assert_eq!(out[0].retriever_label(), "a");
    }

    #[test]
    fn test_wants_boost_case_insensitive() {
        assert!(wants_boost("Show WHERE(severity > 7)", DEFAULT_TRIGGER_TOKENS));
        assert!(wants_boost("an LCEL example", DEFAULT_TRIGGER_TOKENS));
        assert!(!wants_boost("where is the server", DEFAULT_TRIGGER_TOKENS));
        assert!(!wants_boost("anything", &[""]));
    }

    #[test]
    fn test_round_robin_follows_label_order() {
        let docs = vec![
            doc("b1", "b"),
            doc("b2", "b"),
            doc("a1", "a"),
            doc("a2", "a"),
        ];
        let out = balanced_slice(docs, &labels(&["a", "b"]), 3, false, None);
        let contents: Vec<&str> = out.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["a1", "b1", "a2"]);
    }

    #[test]
    fn test_exhausted_label_is_skipped() {
        let docs = vec![doc("a1", "a"), doc("b1", "b"), doc("b2", "b"), doc("b3", "b")];
        let out = balanced_slice(docs, &labels(&["a", "b"]), 4, false, None);
        let contents: Vec<&str> = out.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["a1", "b1", "b2", "b3"]);
    }

    #[test]
    fn test_boost_takes_two_preferred_first() {
        let docs = vec![
            doc("a1", "a"),
            doc("q1", "query"),
            doc("q2", "query"),
            doc("q3", "query"),
        ];
        let out = balanced_slice(docs, &labels(&["a", "query"]), 4, true, Some("query"));
        let contents: Vec<&str> = out.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "q2", "a1", "q3"]);
    }

    #[test]
    fn test_boost_short_circuits_at_limit() {
        let docs = vec![doc("a1", "a"), doc("q1", "query"), doc("q2", "query")];
        let out = balanced_slice(docs, &labels(&["a", "query"]), 1, true, Some("query"));
        assert_eq!(summary(&out), vec![("q1".into(), "query".into())]);
    }

    #[test]
    fn test_boost_noop_when_preferred_absent() {
        let docs = vec![doc("a1", "a"), doc("b1", "b")];
        let out = balanced_slice(docs, &labels(&["a", "b"]), 2, true, Some("query"));
        let contents: Vec<&str> = out.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["a1", "b1"]);
    }

    #[test]
    fn test_zero_limit_and_empty_input() {
        let out = balanced_slice(vec![doc("a1", "a")], &labels(&["a"]), 0, true, Some("a"));
        assert!(out.is_empty());
        let out = balanced_slice(Vec::new(), &labels(&["a"]), 5, false, None);
        assert!(out.is_empty());
    }

    #[test]
    fn test_limit_never_exceeded() {
        for limit in 0..8 {
            let docs: Vec<Document> = (0..5)
                .flat_map(|i| vec![doc(&format!("a{}", i), "a"), doc(&format!("q{}", i), "query")])
                .collect();
            let out = balanced_slice(docs, &labels(&["a", "query"]), limit, true, Some("query"));
            assert_eq!(out.len(), limit.min(10));
        }
    }
}

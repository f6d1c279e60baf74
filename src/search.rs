//! `fusion search`: run one retrieval against a topic and print the result.

use anyhow::{Context, Result};
use fusion_retrieval_core::render::{doc_title, one_line_preview};
use fusion_retrieval_core::RetrievalReport;

use crate::config::Config;
use crate::topics::Topics;

const PREVIEW_CHARS: usize = 160;

pub async fn run_search(config: &Config, topic: &str, query: &str, json: bool) -> Result<()> {
    let topics = Topics::build(config)?;
    let retriever = topics.get(topic).with_context(|| {
        format!(
            "Unknown topic '{}'. Configured topics: {}",
            topic,
            topics.names().join(", ")
        )
    })?;

    let report = retriever.retrieve_with_report(query).await;

    for member in &report.members {
        if let Some(err) = &member.error {
            eprintln!("warning: dataset '{}' failed: {}", member.label, err);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report.documents)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RetrievalReport) {
    if report.documents.is_empty() {
        println!("No results.");
        return;
    }

    for (i, doc) in report.documents.iter().enumerate() {
        println!("{}. {}", i + 1, doc_title(&doc.metadata));
        println!("    excerpt: \"{}\"", one_line_preview(&doc.content, PREVIEW_CHARS));
        println!();
    }

    let sources: Vec<String> = report
        .record
        .by_source
        .iter()
        .map(|(label, n)| format!("{}={}", label, n))
        .collect();
    println!("{} result(s) from {}", report.record.result_count, sources.join(", "));
}

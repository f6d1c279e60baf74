//! `fusion log`: show recent entries of the durable retrieval log.

use anyhow::{bail, Result};
use fusion_retrieval_core::record::RetrievalRecord;
use fusion_retrieval_core::render::{doc_title, one_line_preview};

use crate::config::Config;
use crate::retrieval_log::read_recent;

const QUERY_CHARS: usize = 80;

pub fn run_log(config: &Config, limit: usize, json: bool) -> Result<()> {
    if !config.log.enabled {
        bail!("The retrieval log is disabled. Set [log] enabled = true in config.");
    }

    let records = read_recent(&config.log.path, limit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No retrievals logged at {}.", config.log.path.display());
        return Ok(());
    }

    for record in &records {
        print_record(record);
    }
    Ok(())
}

fn print_record(record: &RetrievalRecord) {
    let sources: Vec<String> = record
        .by_source
        .iter()
        .map(|(label, n)| format!("{}={}", label, n))
        .collect();
    println!(
        "{}  \"{}\"  {} result(s)  [{}]",
        record.ts,
        one_line_preview(&record.query, QUERY_CHARS),
        record.result_count,
        sources.join(", ")
    );
    for doc in &record.docs {
        println!("    - {}", doc_title(&doc.metadata));
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn fusion_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("fusion");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let cve_dir = root.join("data/cve");
    fs::create_dir_all(&cve_dir).unwrap();
    fs::write(
        cve_dir.join("CVE-2024-0001.txt"),
        "Heap overflow in the PNG decoder allows remote code execution.",
    )
    .unwrap();
    fs::write(
        cve_dir.join("CVE-2024-0002.txt"),
        "SQL injection in the login form through the username parameter.",
    )
    .unwrap();

    let cwe_dir = root.join("data/cwe");
    fs::create_dir_all(&cwe_dir).unwrap();
    fs::write(
        cwe_dir.join("CWE-122.md"),
        "# Heap-based Buffer Overflow\n\nA heap overflow condition is a buffer overflow in the heap.",
    )
    .unwrap();

    fs::write(
        root.join("data/query_examples.jsonl"),
        "{\"q\": \"where(status = 'open')\"}\n{\"q\": \"groupby(host)\"}\n{\"q\": \"calculate(count)\"}\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[log]
path = "{root}/drafts/retrieval.log.jsonl"
lock_timeout_ms = 200

[embedding]
dims = 128

[datasets.cve]
root = "{root}/data/cve"
source_name = "CVE_data"
k = 4

[datasets.cwe]
root = "{root}/data/cwe"
source_name = "CWE_data"

[datasets.query]
root = "{root}/data/query_examples.jsonl"

[topics.code]
datasets = ["cve", "cwe"]
limit = 2

[topics.lcel]
datasets = ["cve", "query"]
limit = 2
"#,
        root = root.display()
    );

    let config_path = config_dir.join("fusion.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_fusion(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = fusion_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run fusion binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn log_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("drafts/retrieval.log.jsonl")
}

#[test]
fn test_topics_lists_configured_topics() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_fusion(&config_path, &["topics"]);
    assert!(success, "topics failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("code"));
    assert!(stdout.contains("cve, cwe"));
    assert!(stdout.contains("lcel"));
}

#[test]
fn test_search_mixes_sources_and_respects_limit() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_fusion(&config_path, &["search", "code", "heap overflow", "--json"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);

    let docs: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(docs.len(), 2);
    let labels: Vec<&str> = docs
        .iter()
        .map(|d| d["metadata"]["_retriever"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["cve", "cwe"], "round-robin across datasets");
}

#[test]
fn test_search_trigger_boosts_preferred_dataset() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_fusion(
        &config_path,
        &["search", "lcel", "how do I write where( filters", "--json"],
    );
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);

    let docs: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(docs.len(), 2);
    for doc in &docs {
        assert_eq!(doc["metadata"]["_retriever"], "query");
    }
}

#[test]
fn test_search_text_output() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_fusion(&config_path, &["search", "code", "SQL injection"]);
    assert!(success);
    assert!(stdout.contains("[CVE_data]") || stdout.contains("[CWE_data]"));
    assert!(stdout.contains("result(s) from"));
}

#[test]
fn test_search_unknown_topic_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_fusion(&config_path, &["search", "nope", "anything"]);
    assert!(!success);
    assert!(stderr.contains("Unknown topic"), "stderr: {}", stderr);
}

#[test]
fn test_search_appends_to_log() {
    let (_tmp, config_path) = setup_test_env();

    run_fusion(&config_path, &["search", "code", "heap overflow"]);
    run_fusion(&config_path, &["search", "lcel", "groupby( host )"]);

    let text = fs::read_to_string(log_path(&config_path)).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);

    let rec: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(rec["query"], "groupby( host )");
    assert_eq!(rec["result_count"], 2);
    assert_eq!(rec["by_source"]["query"], 2);
    assert_eq!(rec["docs"].as_array().unwrap().len(), 2);
    assert!(rec["ts"].as_str().unwrap().ends_with('Z'));
}

#[test]
fn test_log_newest_first() {
    let (_tmp, config_path) = setup_test_env();

    run_fusion(&config_path, &["search", "code", "first query"]);
    run_fusion(&config_path, &["search", "code", "second query"]);

    let (stdout, stderr, success) = run_fusion(&config_path, &["log", "--json"]);
    assert!(success, "log failed: stdout={}, stderr={}", stdout, stderr);
    let records: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["query"], "second query");

    let (stdout, _, success) = run_fusion(&config_path, &["log", "--limit", "1"]);
    assert!(success);
    assert!(stdout.contains("second query"));
    assert!(!stdout.contains("first query"));
}

#[test]
fn test_log_empty() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_fusion(&config_path, &["log"]);
    assert!(success);
    assert!(stdout.contains("No retrievals logged"));
}

#[test]
fn test_invalid_config_fails() {
    let (_tmp, config_path) = setup_test_env();
    fs::write(&config_path, "[topics.x]\ndatasets = [\"missing\"]\n").unwrap();

    let (_, stderr, success) = run_fusion(&config_path, &["topics"]);
    assert!(!success);
    assert!(stderr.contains("unknown dataset"), "stderr: {}", stderr);
}

//! TOML configuration parsing and validation.
//!
//! See `config/fusion.example.toml` for a complete file. Every section is
//! optional; [`load_config`] fills defaults and rejects inconsistent
//! settings (unknown datasets in a topic, out-of-range diversity, …).

use anyhow::{bail, Context, Result};
use fusion_retrieval_core::balance::DEFAULT_TRIGGER_TOKENS;
use fusion_retrieval_core::combined::{DEFAULT_LIMIT, DEFAULT_PREFERRED_LABEL};
use fusion_retrieval_core::telemetry::DEFAULT_CAPACITY;
use fusion_retrieval_core::{FanOut, SearchParams};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub datasets: BTreeMap<String, DatasetConfig>,
    #[serde(default)]
    pub topics: BTreeMap<String, TopicConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_log_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl LogConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

fn default_true() -> bool {
    true
}
fn default_log_path() -> PathBuf {
    PathBuf::from("drafts/retrieval.log.jsonl")
}
fn default_lock_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Empty string disables the preference.
    #[serde(default = "default_preferred_label")]
    pub preferred_label: String,
    #[serde(default = "default_trigger_tokens")]
    pub trigger_tokens: Vec<String>,
    #[serde(default)]
    pub fan_out: FanOut,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            preferred_label: default_preferred_label(),
            trigger_tokens: default_trigger_tokens(),
            fan_out: FanOut::default(),
        }
    }
}

impl RetrievalConfig {
    pub fn preferred(&self) -> Option<String> {
        let label = self.preferred_label.trim();
        if label.is_empty() {
            None
        } else {
            Some(label.to_string())
        }
    }
}

fn default_preferred_label() -> String {
    DEFAULT_PREFERRED_LABEL.to_string()
}
fn default_trigger_tokens() -> Vec<String> {
    DEFAULT_TRIGGER_TOKENS.iter().map(|t| t.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_dims")]
    pub dims: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dims: default_dims(),
        }
    }
}

fn default_dims() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    /// Directory to walk, or a single file.
    pub root: PathBuf,
    /// Dataset name written into document metadata; defaults to the key.
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(flatten)]
    pub search: SearchParams,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.jsonl".to_string(),
    ]
}
fn default_max_chars() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct TopicConfig {
    /// Member datasets, in round-robin order. Each dataset name becomes
    /// the member's label.
    pub datasets: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.telemetry.capacity == 0 {
        bail!("telemetry.capacity must be >= 1");
    }

    if config.embedding.dims == 0 {
        bail!("embedding.dims must be >= 1");
    }

    for (name, ds) in &config.datasets {
        if ds.max_chars == 0 {
            bail!("datasets.{}.max_chars must be > 0", name);
        }
        ds.search
            .validate()
            .with_context(|| format!("datasets.{} has invalid search settings", name))?;
    }

    for (name, topic) in &config.topics {
        if topic.datasets.is_empty() {
            bail!("topics.{}.datasets must list at least one dataset", name);
        }
        for ds in &topic.datasets {
            if !config.datasets.contains_key(ds) {
                bail!("topics.{} references unknown dataset '{}'", name, ds);
            }
        }
        let mut seen = std::collections::HashSet::new();
        for ds in &topic.datasets {
            if !seen.insert(ds) {
                bail!("topics.{} lists dataset '{}' more than once", name, ds);
            }
        }
    }

    Ok(config)
}

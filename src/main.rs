//! # Fusion Retrieval CLI (`fusion`)
//!
//! ## Usage
//!
//! ```bash
//! fusion --config ./config/fusion.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fusion topics` | List configured topics and their datasets |
//! | `fusion search <topic> "<query>"` | Run one combined retrieval |
//! | `fusion log` | Show recent retrievals from the durable log |
//!
//! ## Examples
//!
//! ```bash
//! fusion search code "heap overflow in png decoder"
//! fusion search lcel "where( status = 'open' )" --json
//! RUST_LOG=debug fusion log --limit 5
//! ```

use clap::{Parser, Subcommand};
use fusion_retrieval::{config, log_cmd, logging, search, topics};
use std::path::PathBuf;

/// Fusion Retrieval CLI: query several datasets at once and keep an
/// audit trail of what came back.
#[derive(Parser)]
#[command(
    name = "fusion",
    about = "Fusion Retrieval: combined, deduplicated, source-balanced retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/fusion.toml`. See `config/fusion.example.toml`.
    #[arg(long, global = true, default_value = "./config/fusion.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured topics.
    Topics,

    /// Run one retrieval against a topic.
    ///
    /// Every dataset of the topic is queried; results are deduplicated by
    /// content and balanced across datasets. The retrieval is appended to
    /// the durable log.
    Search {
        /// Topic name, as in `[topics.<name>]`.
        topic: String,

        /// The query string.
        query: String,

        /// Print the returned documents as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show recent retrievals, newest first.
    Log {
        /// Maximum number of records to show.
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Print the records as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Topics => {
            topics::list_topics(&cfg)?;
        }
        Commands::Search { topic, query, json } => {
            search::run_search(&cfg, &topic, &query, json).await?;
        }
        Commands::Log { limit, json } => {
            log_cmd::run_log(&cfg, limit, json)?;
        }
    }

    Ok(())
}

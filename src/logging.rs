//! Tracing subscriber setup for the `fusion` binary.
//!
//! Filter comes from `RUST_LOG` (default `warn`). Output goes to stderr
//! so that `--json` output on stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

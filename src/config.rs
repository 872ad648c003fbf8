//! CLI/server configuration (spec §6). Mirrors `whip/cli.py`'s
//! `--database-dir` global flag and `serve`'s `--host`/`--port`; shared
//! between the CLI entry point and the HTTP surface.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
pub struct Config {
    /// Directory holding the backing KV store's files.
    #[arg(long = "database-dir", visible_alias = "db", default_value = "db", global = true)]
    pub database_dir: PathBuf,

    /// Create the database directory if it doesn't already exist.
    #[arg(long, global = true)]
    pub create_if_missing: bool,

    /// Bind host for `serve`.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port for `serve`.
    #[arg(long, default_value_t = 5555)]
    pub port: u16,

    /// Progress-callback interval, in seconds, during `load` (spec §4.5).
    #[arg(long = "progress-interval-secs", default_value_t = 10)]
    pub progress_interval_secs: u64,
}

impl Config {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

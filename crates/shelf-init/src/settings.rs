//! Settings for the bootstrap binary.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

/// Loaded from an optional TOML file, then `SHELF_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct InitConfig {
  /// SQLite file to create or open. A leading `~/` is expanded.
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  /// Upper bound on each storage call.
  #[serde(default = "default_storage_timeout_ms")]
  pub storage_timeout_ms: u64,
}

impl InitConfig {
  pub fn storage_timeout(&self) -> Duration {
    Duration::from_millis(self.storage_timeout_ms)
  }
}

fn default_store_path() -> PathBuf { PathBuf::from("shelf.db") }

fn default_storage_timeout_ms() -> u64 { 5_000 }

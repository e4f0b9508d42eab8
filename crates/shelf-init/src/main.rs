//! shelf-init binary.
//!
//! Reads `shelf.toml` (or the path given with `--config`), creates or opens
//! the SQLite store, applies the schema and seeds the permanent sink
//! locations. Safe to run any number of times.

mod settings;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use shelf_core::{InventoryService, location::SINK_LOCATIONS};
use shelf_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::InitConfig;

#[derive(Parser)]
#[command(author, version, about = "Initialise a shelf inventory store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "shelf.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SHELF"))
    .build()
    .context("failed to read config file")?;

  let init_cfg: InitConfig = settings
    .try_deserialize()
    .context("failed to deserialise InitConfig")?;

  let store_path = expand_tilde(&init_cfg.store_path);
  if let Some(dir) = store_path.parent()
    && !dir.as_os_str().is_empty()
  {
    std::fs::create_dir_all(dir)
      .with_context(|| format!("failed to create {dir:?}"))?;
  }

  let store =
    SqliteStore::open_with_timeout(&store_path, init_cfg.storage_timeout())
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?;
  tracing::info!(path = ?store_path, "store schema ready");

  let service = InventoryService::new(store);
  let inserted = service.seed().await.context("failed to seed sink locations")?;

  for sink in SINK_LOCATIONS {
    let location = service
      .resolve(&sink.id.into())
      .await
      .with_context(|| format!("sink location {} missing after seeding", sink.id))?;
    println!(
      "{:<10} {:<10} {}",
      location.id,
      location.kind,
      location.description.as_deref().unwrap_or("")
    );
  }
  println!("{inserted} sink location(s) inserted");

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn expand_tilde_leaves_relative_paths() {
    assert_eq!(expand_tilde(Path::new("shelf.db")), PathBuf::from("shelf.db"));
  }
}

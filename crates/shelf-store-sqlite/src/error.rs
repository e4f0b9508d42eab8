//! Error type for `shelf-store-sqlite`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rule was violated; nothing was written.
  #[error(transparent)]
  Core(#[from] shelf_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The operation did not finish in time. It may still complete on the
  /// database thread, so its outcome is unknown.
  #[error("storage operation timed out after {0:?}")]
  Timeout(Duration),
}

impl From<Error> for shelf_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(inner) => inner,
      other => shelf_core::Error::Storage(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

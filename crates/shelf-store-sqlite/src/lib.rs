//! SQLite backend for the shelf inventory store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every write is one SQLite transaction.

mod encode;
mod ops;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{DEFAULT_TIMEOUT, SqliteStore};

#[cfg(test)]
mod tests;

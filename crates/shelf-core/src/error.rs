//! Error types for `shelf-core`.
//!
//! Every variant carries the offending id and a reason so a caller can act on
//! it without inspecting store internals.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Which kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
  Location,
  Item,
  Movement,
}

impl std::fmt::Display for Entity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::Location => "location",
      Self::Item => "item",
      Self::Movement => "movement",
    })
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{entity} not found: {id}")]
  NotFound { entity: Entity, id: String },

  #[error("{entity} id already exists: {id}")]
  DuplicateId { entity: Entity, id: String },

  #[error("invalid location {id}: {reason}")]
  InvalidLocation { id: String, reason: String },

  #[error("invalid parent {parent_id} for location {id}: {reason}")]
  InvalidParent {
    id:        String,
    parent_id: String,
    reason:    String,
  },

  #[error(
    "invalid quantity {requested:?} for item {item_id} (available: {available:?})"
  )]
  InvalidQuantity {
    item_id:   String,
    requested: Option<i64>,
    available: Option<i64>,
  },

  #[error("timestamp {requested} is earlier than the ledger head {head}")]
  InvalidTimestamp {
    requested: DateTime<Utc>,
    head:      DateTime<Utc>,
  },

  #[error("location {id} is still referenced by items, movements or children")]
  LocationInUse { id: String },

  #[error("movement {movement_id} ({action}) cannot be reverted")]
  NotRevertible { movement_id: i64, action: String },

  #[error("item {item_id} changed concurrently; re-read and retry")]
  Conflict { item_id: String },

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn location_not_found(id: impl Into<String>) -> Self {
    Self::NotFound { entity: Entity::Location, id: id.into() }
  }

  pub fn item_not_found(id: impl Into<String>) -> Self {
    Self::NotFound { entity: Entity::Item, id: id.into() }
  }

  /// True for errors raised by validation, before anything was written.
  pub fn is_validation(&self) -> bool { !matches!(self, Self::Storage(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

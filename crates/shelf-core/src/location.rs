//! Locations: the physical places items live in.
//!
//! Locations form a forest: each record optionally names a parent by id. The
//! records themselves live in an id-keyed arena owned by the store; parent
//! links are never trusted to be acyclic and are checked with an explicit
//! ancestor walk on every assignment.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, id::LocationId};

// ─── Sinks ───────────────────────────────────────────────────────────────────

pub const TRASH: &str = "TRASH";
pub const CUSTOMER: &str = "CUSTOMER";
pub const IN_USE: &str = "IN-USE";

/// A permanent terminal location seeded at startup.
#[derive(Debug, Clone, Copy)]
pub struct SinkLocation {
  pub id:          &'static str,
  pub kind:        &'static str,
  pub description: &'static str,
}

/// The three locations that must always exist.
pub const SINK_LOCATIONS: [SinkLocation; 3] = [
  SinkLocation { id: TRASH, kind: "disposal", description: "Trash/Disposed" },
  SinkLocation {
    id:          CUSTOMER,
    kind:        "customer",
    description: "Shipped to Customer",
  },
  SinkLocation {
    id:          IN_USE,
    kind:        "temporary",
    description: "Currently In Use",
  },
];

/// Location types that mark an item as having left circulation.
pub const TERMINAL_TYPES: &[&str] = &["disposal", "customer"];

pub fn is_seeded_sink(id: &LocationId) -> bool {
  SINK_LOCATIONS.iter().any(|s| id == s.id)
}

impl SinkLocation {
  pub fn to_location(self, created_at: DateTime<Utc>) -> Location {
    Location {
      id: LocationId::from(self.id),
      kind: self.kind.to_owned(),
      room: None,
      description: Some(self.description.to_owned()),
      parent_id: None,
      created_at,
    }
  }
}

// ─── Location ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
  pub id:          LocationId,
  /// Open category tag: `bin`, `rack`, `disposal`, `customer`, ...
  #[serde(rename = "type")]
  pub kind:        String,
  pub room:        Option<String>,
  pub description: Option<String>,
  pub parent_id:   Option<LocationId>,
  pub created_at:  DateTime<Utc>,
}

impl Location {
  /// Seeded sinks, plus anything typed as a terminal location.
  pub fn is_sink(&self) -> bool {
    is_seeded_sink(&self.id) || TERMINAL_TYPES.contains(&self.kind.as_str())
  }
}

/// Input to [`crate::service::InventoryService::create_location`].
#[derive(Debug, Clone)]
pub struct NewLocation {
  pub id:          LocationId,
  pub kind:        String,
  pub room:        Option<String>,
  pub description: Option<String>,
  pub parent_id:   Option<LocationId>,
}

impl NewLocation {
  pub fn new(id: impl Into<LocationId>, kind: impl Into<String>) -> Self {
    Self {
      id:          id.into(),
      kind:        kind.into(),
      room:        None,
      description: None,
      parent_id:   None,
    }
  }

  pub fn with_parent(mut self, parent: impl Into<LocationId>) -> Self {
    self.parent_id = Some(parent.into());
    self
  }

  pub fn with_room(mut self, room: impl Into<String>) -> Self {
    self.room = Some(room.into());
    self
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn into_location(self, created_at: DateTime<Utc>) -> Location {
    Location {
      id: self.id,
      kind: self.kind,
      room: self.room,
      description: self.description,
      parent_id: self.parent_id,
      created_at,
    }
  }
}

/// A metadata edit. `None` leaves a field untouched; `Some(None)` clears an
/// optional field.
#[derive(Debug, Clone, Default)]
pub struct LocationPatch {
  pub kind:        Option<String>,
  pub room:        Option<Option<String>>,
  pub description: Option<Option<String>>,
  pub parent_id:   Option<Option<LocationId>>,
}

impl LocationPatch {
  pub fn reparent(parent: Option<LocationId>) -> Self {
    Self { parent_id: Some(parent), ..Self::default() }
  }

  pub fn apply(self, location: &mut Location) {
    if let Some(kind) = self.kind {
      location.kind = kind;
    }
    if let Some(room) = self.room {
      location.room = room;
    }
    if let Some(description) = self.description {
      location.description = description;
    }
    if let Some(parent_id) = self.parent_id {
      location.parent_id = parent_id;
    }
  }
}

// ─── Ancestor walk ───────────────────────────────────────────────────────────

/// Validate that `target` may hang below `proposed`.
///
/// Walks the ancestor chain starting at `proposed`, loading each record with
/// `lookup`. Rejects a missing parent, any chain that reaches `target`, and
/// any chain that revisits a node. The seeded sinks are roots: they may
/// neither have a parent nor be one. Locations that are merely typed as
/// terminal nest like any other.
///
/// The outer `Result` carries lookup failures; the inner one the verdict.
pub fn check_parent<E>(
  target: &Location,
  proposed: &LocationId,
  mut lookup: impl FnMut(&LocationId) -> Result<Option<Location>, E>,
) -> Result<Result<()>, E> {
  let reject = |reason: &str| -> Result<()> {
    Err(Error::InvalidParent {
      id:        target.id.to_string(),
      parent_id: proposed.to_string(),
      reason:    reason.to_owned(),
    })
  };

  if is_seeded_sink(&target.id) {
    return Ok(reject("seeded sink locations cannot have a parent"));
  }
  if *proposed == target.id {
    return Ok(reject("a location cannot be its own parent"));
  }

  let mut visited = HashSet::new();
  let mut current = proposed.clone();
  loop {
    if current == target.id {
      return Ok(reject("would create a cycle"));
    }
    if !visited.insert(current.clone()) {
      return Ok(reject("ancestor chain already contains a cycle"));
    }
    let Some(location) = lookup(&current)? else {
      return Ok(reject(if current == *proposed {
        "parent does not exist"
      } else {
        "ancestor chain references a missing location"
      }));
    };
    if current == *proposed && is_seeded_sink(&current) {
      return Ok(reject("seeded sink locations cannot contain other locations"));
    }
    match location.parent_id {
      Some(parent) => current = parent,
      None => return Ok(Ok(())),
    }
  }
}

/// The ancestor chain of `start`, nearest first, excluding `start` itself.
///
/// Stops at a root. A revisited node or a dangling parent reference is
/// reported as an error rather than looping.
pub fn ancestors<E>(
  start: &Location,
  mut lookup: impl FnMut(&LocationId) -> Result<Option<Location>, E>,
) -> Result<Result<Vec<Location>>, E> {
  let mut visited = HashSet::from([start.id.clone()]);
  let mut chain = Vec::new();
  let mut next = start.parent_id.clone();

  while let Some(id) = next {
    if !visited.insert(id.clone()) {
      return Ok(Err(Error::InvalidParent {
        id:        start.id.to_string(),
        parent_id: id.to_string(),
        reason:    "ancestor chain contains a cycle".to_owned(),
      }));
    }
    let Some(location) = lookup(&id)? else {
      return Ok(Err(Error::location_not_found(id.into_inner())));
    };
    next = location.parent_id.clone();
    chain.push(location);
  }

  Ok(Ok(chain))
}

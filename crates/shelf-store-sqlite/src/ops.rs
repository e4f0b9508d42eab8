//! Synchronous transaction bodies, run on the database thread.
//!
//! Each function takes a connection (or an open transaction) and returns a
//! nested result: the outer layer is a database fault, the inner one a domain
//! verdict. A domain rejection returns before any statement that writes, and
//! the caller drops the transaction uncommitted.

use rusqlite::{Connection, OptionalExtension as _, params};
use shelf_core::{
  Entity, Error as CoreError,
  id::{ItemId, LocationId},
  item::Item,
  location::{Location, check_parent, is_seeded_sink},
  movement::{ItemTransition, Movement, NewMovement},
};

use crate::encode::{
  ITEM_COLUMNS, LOCATION_COLUMNS, RawItem, RawLocation, decode_dt, encode_dt,
  normalize_dt,
};

pub type TxResult<T> = tokio_rusqlite::Result<shelf_core::Result<T>>;

/// Carry a decoding failure out of a `call` closure.
pub fn other(e: crate::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

// ─── Lookups ─────────────────────────────────────────────────────────────────

pub fn load_location(
  conn: &Connection,
  id: &LocationId,
) -> tokio_rusqlite::Result<Option<Location>> {
  let raw = conn
    .query_row(
      &format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1"),
      params![id.as_str()],
      RawLocation::from_row,
    )
    .optional()?;
  raw.map(RawLocation::into_location).transpose().map_err(other)
}

pub fn load_item(
  conn: &Connection,
  id: &ItemId,
) -> tokio_rusqlite::Result<Option<Item>> {
  let raw = conn
    .query_row(
      &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
      params![id.as_str()],
      RawItem::from_row,
    )
    .optional()?;
  raw.map(RawItem::into_item).transpose().map_err(other)
}

fn location_exists(conn: &Connection, id: &LocationId) -> rusqlite::Result<bool> {
  conn
    .query_row(
      "SELECT 1 FROM locations WHERE id = ?1",
      params![id.as_str()],
      |_| Ok(()),
    )
    .optional()
    .map(|r| r.is_some())
}

// ─── Locations ───────────────────────────────────────────────────────────────

pub fn insert_location(conn: &Connection, location: &Location) -> TxResult<()> {
  if location_exists(conn, &location.id)? {
    return Ok(Err(CoreError::DuplicateId {
      entity: Entity::Location,
      id:     location.id.to_string(),
    }));
  }
  if let Some(parent) = &location.parent_id
    && let Err(e) = check_parent(location, parent, |id| load_location(conn, id))?
  {
    return Ok(Err(e));
  }

  conn.execute(
    "INSERT INTO locations (id, type, room, description, parent_id, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      location.id.as_str(),
      location.kind,
      location.room,
      location.description,
      location.parent_id.as_ref().map(LocationId::as_str),
      encode_dt(location.created_at),
    ],
  )?;
  Ok(Ok(()))
}

pub fn update_location(conn: &Connection, updated: &Location) -> TxResult<()> {
  if !location_exists(conn, &updated.id)? {
    return Ok(Err(CoreError::location_not_found(updated.id.as_str())));
  }
  if let Some(parent) = &updated.parent_id
    && let Err(e) = check_parent(updated, parent, |id| load_location(conn, id))?
  {
    return Ok(Err(e));
  }

  conn.execute(
    "UPDATE locations
        SET type = ?2, room = ?3, description = ?4, parent_id = ?5
      WHERE id = ?1",
    params![
      updated.id.as_str(),
      updated.kind,
      updated.room,
      updated.description,
      updated.parent_id.as_ref().map(LocationId::as_str),
    ],
  )?;
  Ok(Ok(()))
}

pub fn delete_location(conn: &Connection, id: &LocationId) -> TxResult<()> {
  if !location_exists(conn, id)? {
    return Ok(Err(CoreError::location_not_found(id.as_str())));
  }
  if is_seeded_sink(id) {
    return Ok(Err(CoreError::InvalidLocation {
      id:     id.to_string(),
      reason: "seeded sink locations are permanent".to_owned(),
    }));
  }

  let referenced: bool = conn.query_row(
    "SELECT EXISTS (SELECT 1 FROM items WHERE current_location_id = ?1)
         OR EXISTS (SELECT 1 FROM movements
                     WHERE from_location_id = ?1 OR to_location_id = ?1)
         OR EXISTS (SELECT 1 FROM locations WHERE parent_id = ?1)",
    params![id.as_str()],
    |r| r.get(0),
  )?;
  if referenced {
    return Ok(Err(CoreError::LocationInUse { id: id.to_string() }));
  }

  conn.execute("DELETE FROM locations WHERE id = ?1", params![id.as_str()])?;
  Ok(Ok(()))
}

// ─── Items ───────────────────────────────────────────────────────────────────

pub fn insert_item(conn: &Connection, item: &Item) -> TxResult<()> {
  if load_item(conn, &item.id)?.is_some() {
    return Ok(Err(CoreError::DuplicateId {
      entity: Entity::Item,
      id:     item.id.to_string(),
    }));
  }
  if !location_exists(conn, &item.current_location_id)? {
    return Ok(Err(CoreError::InvalidLocation {
      id:     item.current_location_id.to_string(),
      reason: "location does not exist".to_owned(),
    }));
  }

  conn.execute(
    "INSERT INTO items (
       id, description, type, quantity,
       current_location_id, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      item.id.as_str(),
      item.description,
      item.kind,
      item.quantity,
      item.current_location_id.as_str(),
      encode_dt(item.created_at),
      encode_dt(item.updated_at),
    ],
  )?;
  Ok(Ok(()))
}

pub fn update_item_metadata(conn: &Connection, item: &Item) -> rusqlite::Result<()> {
  conn.execute(
    "UPDATE items SET description = ?2, type = ?3, updated_at = ?4 WHERE id = ?1",
    params![
      item.id.as_str(),
      item.description,
      item.kind,
      encode_dt(item.updated_at),
    ],
  )?;
  Ok(())
}

/// The guarded half of a movement: move the item only if it is still where
/// the plan found it, holding the quantity the plan saw.
pub fn apply_transition(conn: &Connection, t: &ItemTransition) -> TxResult<()> {
  if load_item(conn, &t.item_id)?.is_none() {
    return Ok(Err(CoreError::item_not_found(t.item_id.as_str())));
  }
  if !location_exists(conn, &t.location_id)? {
    return Ok(Err(CoreError::InvalidLocation {
      id:     t.location_id.to_string(),
      reason: "location does not exist".to_owned(),
    }));
  }

  let changed = conn.execute(
    "UPDATE items
        SET current_location_id = ?2, quantity = ?3, updated_at = ?4
      WHERE id = ?1
        AND current_location_id = ?5
        AND quantity IS ?6",
    params![
      t.item_id.as_str(),
      t.location_id.as_str(),
      t.quantity,
      encode_dt(normalize_dt(t.updated_at)),
      t.expected_location.as_str(),
      t.expected_quantity,
    ],
  )?;
  if changed == 0 {
    return Ok(Err(CoreError::Conflict { item_id: t.item_id.to_string() }));
  }
  Ok(Ok(()))
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// Append one entry, assigning its id and settling its timestamp against the
/// ledger head.
pub fn append_movement(conn: &Connection, entry: NewMovement) -> TxResult<Movement> {
  let head: Option<String> = conn
    .query_row(
      "SELECT timestamp FROM movements ORDER BY id DESC LIMIT 1",
      [],
      |r| r.get(0),
    )
    .optional()?;
  let head = head.as_deref().map(decode_dt).transpose().map_err(other)?;

  let requested = normalize_dt(entry.timestamp);
  let timestamp = match head {
    Some(head) if requested < head && entry.backfilled => {
      return Ok(Err(CoreError::InvalidTimestamp { requested, head }));
    }
    Some(head) if requested < head => head,
    _ => requested,
  };

  conn.execute(
    "INSERT INTO movements (
       timestamp, item_id, from_location_id, to_location_id,
       quantity, action, transcript, notes
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    params![
      encode_dt(timestamp),
      entry.item_id.as_str(),
      entry.from_location_id.as_ref().map(LocationId::as_str),
      entry.to_location_id.as_ref().map(LocationId::as_str),
      entry.quantity,
      entry.action.as_str(),
      entry.transcript,
      entry.notes,
    ],
  )?;
  let id = conn.last_insert_rowid();
  Ok(Ok(entry.into_movement(id, timestamp)))
}

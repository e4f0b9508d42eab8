//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed six fractional
//! digits, so text order in SQL equals time order. Ids are plain text.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use shelf_core::{
  id::{ItemId, LocationId},
  item::Item,
  location::Location,
  movement::{Action, Movement},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Drop precision SQLite will not keep, so returned values equal re-read ones.
pub fn normalize_dt(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── LIKE patterns ───────────────────────────────────────────────────────────

/// Escape `%`, `_` and `\` for use with `LIKE ... ESCAPE '\'`.
pub fn like_escape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const LOCATION_COLUMNS: &str =
  "id, type, room, description, parent_id, created_at";

/// Raw strings read directly from a `locations` row.
pub struct RawLocation {
  pub id:          String,
  pub kind:        String,
  pub room:        Option<String>,
  pub description: Option<String>,
  pub parent_id:   Option<String>,
  pub created_at:  String,
}

impl RawLocation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      kind:        row.get(1)?,
      room:        row.get(2)?,
      description: row.get(3)?,
      parent_id:   row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_location(self) -> Result<Location> {
    Ok(Location {
      id:          LocationId::new(self.id),
      kind:        self.kind,
      room:        self.room,
      description: self.description,
      parent_id:   self.parent_id.map(LocationId::new),
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub const ITEM_COLUMNS: &str = "id, description, type, quantity, \
                                current_location_id, created_at, updated_at";

/// Raw values read directly from an `items` row.
pub struct RawItem {
  pub id:                  String,
  pub description:         String,
  pub kind:                String,
  pub quantity:            Option<i64>,
  pub current_location_id: String,
  pub created_at:          String,
  pub updated_at:          String,
}

impl RawItem {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                  row.get(0)?,
      description:         row.get(1)?,
      kind:                row.get(2)?,
      quantity:            row.get(3)?,
      current_location_id: row.get(4)?,
      created_at:          row.get(5)?,
      updated_at:          row.get(6)?,
    })
  }

  pub fn into_item(self) -> Result<Item> {
    Ok(Item {
      id:                  ItemId::new(self.id),
      description:         self.description,
      kind:                self.kind,
      quantity:            self.quantity,
      current_location_id: LocationId::new(self.current_location_id),
      created_at:          decode_dt(&self.created_at)?,
      updated_at:          decode_dt(&self.updated_at)?,
    })
  }
}

pub const MOVEMENT_COLUMNS: &str = "id, timestamp, item_id, from_location_id, \
                                    to_location_id, quantity, action, \
                                    transcript, notes";

/// Raw values read directly from a `movements` row.
pub struct RawMovement {
  pub id:               i64,
  pub timestamp:        String,
  pub item_id:          String,
  pub from_location_id: Option<String>,
  pub to_location_id:   Option<String>,
  pub quantity:         Option<i64>,
  pub action:           String,
  pub transcript:       Option<String>,
  pub notes:            Option<String>,
}

impl RawMovement {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get(0)?,
      timestamp:        row.get(1)?,
      item_id:          row.get(2)?,
      from_location_id: row.get(3)?,
      to_location_id:   row.get(4)?,
      quantity:         row.get(5)?,
      action:           row.get(6)?,
      transcript:       row.get(7)?,
      notes:            row.get(8)?,
    })
  }

  pub fn into_movement(self) -> Result<Movement> {
    Ok(Movement {
      id:               self.id,
      timestamp:        decode_dt(&self.timestamp)?,
      item_id:          ItemId::new(self.item_id),
      from_location_id: self.from_location_id.map(LocationId::new),
      to_location_id:   self.to_location_id.map(LocationId::new),
      quantity:         self.quantity,
      action:           Action::parse(&self.action),
      transcript:       self.transcript,
      notes:            self.notes,
    })
  }
}

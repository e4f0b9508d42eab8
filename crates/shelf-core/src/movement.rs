//! Movements: the append-only ledger of where items went.
//!
//! A movement is an immutable fact. The cached state on an [`Item`] is only
//! ever changed together with one appended movement, so replaying an item's
//! ledger always lands on its current location.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  id::{ItemId, LocationId},
  item::Item,
  location::{Location, TRASH},
};

// ─── Action ──────────────────────────────────────────────────────────────────

/// Classification tag for a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Action {
  /// Stock arriving; adds to the on-hand quantity.
  Receive,
  Move,
  Ship,
  Dispose,
  Use,
  /// Sets the on-hand quantity in place.
  Adjust,
  /// Compensates for the previous movement of the item.
  Revert,
  /// Any other tag, kept as written. Only [`Action::parse`] builds one, so a
  /// known tag never ends up here.
  Custom(CustomAction),
}

/// An action tag outside the known set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAction(String);

impl CustomAction {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl Action {
  /// The string stored in the `action` column.
  pub fn as_str(&self) -> &str {
    match self {
      Self::Receive => "receive",
      Self::Move => "move",
      Self::Ship => "ship",
      Self::Dispose => "dispose",
      Self::Use => "use",
      Self::Adjust => "adjust",
      Self::Revert => "revert",
      Self::Custom(tag) => tag.as_str(),
    }
  }

  /// Case-insensitive; also understands the `ADD`/`REMOVE` tags written by
  /// older front ends. Unknown tags keep their original spelling.
  pub fn parse(s: &str) -> Self {
    match s.to_ascii_lowercase().as_str() {
      "receive" | "add" => Self::Receive,
      "move" => Self::Move,
      "ship" => Self::Ship,
      "dispose" | "remove" => Self::Dispose,
      "use" => Self::Use,
      "adjust" => Self::Adjust,
      "revert" | "undo" => Self::Revert,
      _ => Self::Custom(CustomAction(s.to_owned())),
    }
  }
}

impl std::fmt::Display for Action {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<String> for Action {
  fn from(s: String) -> Self { Self::parse(&s) }
}

impl From<&str> for Action {
  fn from(s: &str) -> Self { Self::parse(s) }
}

impl From<Action> for String {
  fn from(a: Action) -> Self { a.as_str().to_owned() }
}

// ─── Movement ────────────────────────────────────────────────────────────────

/// A ledger entry. Never edited or removed once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
  /// Strictly increasing, assigned at append time.
  pub id:               i64,
  /// Non-decreasing with `id`.
  pub timestamp:        DateTime<Utc>,
  pub item_id:          ItemId,
  pub from_location_id: Option<LocationId>,
  pub to_location_id:   Option<LocationId>,
  pub quantity:         Option<i64>,
  pub action:           Action,
  /// The command text that produced this entry, if any.
  pub transcript:       Option<String>,
  pub notes:            Option<String>,
}

/// A ledger entry before the ledger has assigned its id.
#[derive(Debug, Clone)]
pub struct NewMovement {
  pub item_id:          ItemId,
  pub from_location_id: Option<LocationId>,
  pub to_location_id:   Option<LocationId>,
  pub quantity:         Option<i64>,
  pub action:           Action,
  pub transcript:       Option<String>,
  pub notes:            Option<String>,
  pub timestamp:        DateTime<Utc>,
  /// A backfilled timestamp is kept as given and must not precede the ledger
  /// head; a clock-assigned one is raised to the head instead.
  pub backfilled:       bool,
}

impl NewMovement {
  pub fn into_movement(self, id: i64, timestamp: DateTime<Utc>) -> Movement {
    Movement {
      id,
      timestamp,
      item_id: self.item_id,
      from_location_id: self.from_location_id,
      to_location_id: self.to_location_id,
      quantity: self.quantity,
      action: self.action,
      transcript: self.transcript,
      notes: self.notes,
    }
  }
}

// ─── Requests and plans ──────────────────────────────────────────────────────

/// Input to [`crate::service::InventoryService::record_movement`].
#[derive(Debug, Clone)]
pub struct MovementRequest {
  pub item_id:        ItemId,
  pub to_location_id: LocationId,
  pub quantity:       Option<i64>,
  pub action:         Action,
  pub transcript:     Option<String>,
  pub notes:          Option<String>,
  /// Explicit timestamp for backfilled entries.
  pub timestamp:      Option<DateTime<Utc>>,
}

impl MovementRequest {
  pub fn new(
    item_id: impl Into<ItemId>,
    to_location_id: impl Into<LocationId>,
    action: Action,
  ) -> Self {
    Self {
      item_id: item_id.into(),
      to_location_id: to_location_id.into(),
      quantity: None,
      action,
      transcript: None,
      notes: None,
      timestamp: None,
    }
  }

  pub fn with_quantity(mut self, quantity: i64) -> Self {
    self.quantity = Some(quantity);
    self
  }

  pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
    self.transcript = Some(transcript.into());
    self
  }

  pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
    self.notes = Some(notes.into());
    self
  }

  pub fn backfilled_at(mut self, timestamp: DateTime<Utc>) -> Self {
    self.timestamp = Some(timestamp);
    self
  }
}

/// The new cached state of an item, guarded by the state it was computed
/// from. A store applies it only if the item still matches the guard.
#[derive(Debug, Clone)]
pub struct ItemTransition {
  pub item_id:           ItemId,
  pub expected_location: LocationId,
  pub expected_quantity: Option<i64>,
  pub location_id:       LocationId,
  pub quantity:          Option<i64>,
  pub updated_at:        DateTime<Utc>,
}

/// One unit of work: an item transition and the ledger entry recording it.
#[derive(Debug, Clone)]
pub struct MovementPlan {
  pub transition: ItemTransition,
  pub entry:      NewMovement,
}

impl MovementPlan {
  fn new(
    item: &Item,
    to: LocationId,
    quantity: Option<i64>,
    entry: NewMovement,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      transition: ItemTransition {
        item_id:           item.id.clone(),
        expected_location: item.current_location_id.clone(),
        expected_quantity: item.quantity,
        location_id:       to,
        quantity,
        updated_at:        now,
      },
      entry,
    }
  }
}

/// Validate `request` against the item's current state and compute the
/// resulting transition.
///
/// Quantity rules:
/// - negative quantities are rejected;
/// - `receive` adds the quantity to a tracked item's on-hand count;
/// - `adjust` requires a quantity and sets the on-hand count to it;
/// - every other action relocates the whole record, and on a tracked item the
///   quantity moved may not exceed what is on hand.
pub fn plan_movement(
  item: &Item,
  to: &Location,
  request: MovementRequest,
  now: DateTime<Utc>,
) -> Result<MovementPlan> {
  let requested = request.quantity;
  let invalid = || Error::InvalidQuantity {
    item_id:   item.id.to_string(),
    requested,
    available: item.quantity,
  };

  if let Some(q) = requested
    && q < 0
  {
    return Err(invalid());
  }

  let (on_hand, moved) = match (&request.action, item.quantity, requested) {
    (Action::Adjust, _, None) => return Err(invalid()),
    (Action::Adjust, _, Some(q)) => (Some(q), Some(q)),
    (Action::Receive, Some(have), Some(q)) => {
      (Some(have.checked_add(q).ok_or_else(invalid)?), Some(q))
    }
    (Action::Receive, have, q) => (have, q),
    (_, Some(have), Some(q)) if q > have => return Err(invalid()),
    (_, have, Some(q)) => (have, Some(q)),
    (_, have, None) => (have, have),
  };

  let entry = NewMovement {
    item_id:          item.id.clone(),
    from_location_id: Some(item.current_location_id.clone()),
    to_location_id:   Some(to.id.clone()),
    quantity:         moved,
    action:           request.action,
    transcript:       request.transcript,
    notes:            request.notes,
    timestamp:        request.timestamp.unwrap_or(now),
    backfilled:       request.timestamp.is_some(),
  };

  Ok(MovementPlan::new(item, to.id.clone(), on_hand, entry, now))
}

/// Plan a compensating movement for `last`, the most recent ledger entry of
/// `item`.
///
/// The item goes back to where `last` took it from, or to the trash when
/// `last` created it. A reverted `receive` gives the received quantity back.
/// Undo is one level deep: `adjust` and `revert` entries are not revertible.
pub fn plan_revert(
  item: &Item,
  last: &Movement,
  transcript: Option<String>,
  now: DateTime<Utc>,
) -> Result<MovementPlan> {
  if matches!(last.action, Action::Adjust | Action::Revert) {
    return Err(Error::NotRevertible {
      movement_id: last.id,
      action:      last.action.to_string(),
    });
  }
  if last.item_id != item.id
    || last.to_location_id.as_ref() != Some(&item.current_location_id)
  {
    return Err(Error::Conflict { item_id: item.id.to_string() });
  }

  let target = last
    .from_location_id
    .clone()
    .unwrap_or_else(|| LocationId::from(TRASH));

  let on_hand = match (&last.action, item.quantity, last.quantity) {
    (Action::Receive, Some(have), Some(q)) => Some(have.saturating_sub(q).max(0)),
    (_, have, _) => have,
  };

  let entry = NewMovement {
    item_id:          item.id.clone(),
    from_location_id: Some(item.current_location_id.clone()),
    to_location_id:   Some(target.clone()),
    quantity:         last.quantity,
    action:           Action::Revert,
    transcript,
    notes:            Some(format!("reverts movement {}", last.id)),
    timestamp:        now,
    backfilled:       false,
  };

  Ok(MovementPlan::new(item, target, on_hand, entry, now))
}

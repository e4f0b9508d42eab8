//! Items: the things being tracked.
//!
//! An item always sits at exactly one location. Its location and quantity
//! change only through a movement; description and type may be edited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ItemId, LocationId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
  pub id:                  ItemId,
  pub description:         String,
  #[serde(rename = "type")]
  pub kind:                String,
  /// `None` for unique items that are not counted.
  pub quantity:            Option<i64>,
  pub current_location_id: LocationId,
  pub created_at:          DateTime<Utc>,
  /// Bumped by every movement and every metadata edit.
  pub updated_at:          DateTime<Utc>,
}

impl Item {
  pub fn is_quantity_tracked(&self) -> bool { self.quantity.is_some() }
}

/// Input to [`crate::service::InventoryService::create_item`] and
/// [`crate::service::InventoryService::receive_item`].
#[derive(Debug, Clone)]
pub struct NewItem {
  /// Generated when absent.
  pub id:          Option<ItemId>,
  pub description: String,
  pub kind:        String,
  pub quantity:    Option<i64>,
  pub location_id: LocationId,
}

impl NewItem {
  pub fn new(
    id: impl Into<ItemId>,
    description: impl Into<String>,
    location_id: impl Into<LocationId>,
  ) -> Self {
    Self {
      id:          Some(id.into()),
      description: description.into(),
      kind:        "general".to_owned(),
      quantity:    None,
      location_id: location_id.into(),
    }
  }

  pub fn with_quantity(mut self, quantity: i64) -> Self {
    self.quantity = Some(quantity);
    self
  }

  pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
    self.kind = kind.into();
    self
  }

  pub fn into_item(self, id: ItemId, now: DateTime<Utc>) -> Item {
    Item {
      id,
      description: self.description,
      kind: self.kind,
      quantity: self.quantity,
      current_location_id: self.location_id,
      created_at: now,
      updated_at: now,
    }
  }
}

/// A metadata edit; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
  pub description: Option<String>,
  pub kind:        Option<String>,
}

impl ItemPatch {
  pub fn apply(self, item: &mut Item, now: DateTime<Utc>) {
    if let Some(description) = self.description {
      item.description = description;
    }
    if let Some(kind) = self.kind {
      item.kind = kind;
    }
    item.updated_at = now;
  }
}

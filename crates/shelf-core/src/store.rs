//! The `InventoryStore` trait.
//!
//! Implemented by storage backends (e.g. `shelf-store-sqlite`). The
//! [`InventoryService`](crate::service::InventoryService) is the only intended
//! caller; it validates requests and hands the store complete units of work.
//!
//! Every write method is atomic: it either applies completely or leaves the
//! store as it was. Domain failures detected inside a write (duplicate ids,
//! parent cycles, a stale movement plan) surface as the backend's wrapping of
//! [`crate::Error`].

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  id::{ItemId, LocationId},
  item::{Item, ItemPatch},
  location::{Location, LocationPatch},
  movement::{Movement, MovementPlan, NewMovement},
};

/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded runtime.
pub trait InventoryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Locations ─────────────────────────────────────────────────────────

  /// Insert a new location.
  ///
  /// Fails with `DuplicateId` if the id is taken and `InvalidParent` if the
  /// parent is missing or rejected by
  /// [`check_parent`](crate::location::check_parent).
  fn insert_location(
    &self,
    location: Location,
  ) -> impl Future<Output = Result<Location, Self::Error>> + Send + '_;

  /// Insert the location unless one with the same id exists. Returns `true`
  /// if a row was written. Safe to race with itself.
  fn insert_location_if_absent(
    &self,
    location: Location,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn get_location<'a>(
    &'a self,
    id: &'a LocationId,
  ) -> impl Future<Output = Result<Option<Location>, Self::Error>> + Send + 'a;

  /// All locations ordered by id.
  fn list_locations(
    &self,
  ) -> impl Future<Output = Result<Vec<Location>, Self::Error>> + Send + '_;

  /// Locations whose `parent_id` is `id`, ordered by id.
  fn list_children<'a>(
    &'a self,
    id: &'a LocationId,
  ) -> impl Future<Output = Result<Vec<Location>, Self::Error>> + Send + 'a;

  /// The ancestor chain of `id`, nearest first.
  fn ancestors<'a>(
    &'a self,
    id: &'a LocationId,
  ) -> impl Future<Output = Result<Vec<Location>, Self::Error>> + Send + 'a;

  /// Apply a metadata edit. A parent change is validated in the same
  /// transaction that writes it.
  fn update_location(
    &self,
    id: LocationId,
    patch: LocationPatch,
  ) -> impl Future<Output = Result<Location, Self::Error>> + Send + '_;

  /// Delete an unreferenced, non-sink location.
  fn delete_location(
    &self,
    id: LocationId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Items ─────────────────────────────────────────────────────────────

  /// Insert a new item. Fails with `DuplicateId` or `InvalidLocation`.
  fn insert_item(
    &self,
    item: Item,
  ) -> impl Future<Output = Result<Item, Self::Error>> + Send + '_;

  /// Insert a new item and its first ledger entry in one transaction.
  fn insert_item_with_movement(
    &self,
    item: Item,
    entry: NewMovement,
  ) -> impl Future<Output = Result<(Item, Movement), Self::Error>> + Send + '_;

  fn get_item<'a>(
    &'a self,
    id: &'a ItemId,
  ) -> impl Future<Output = Result<Option<Item>, Self::Error>> + Send + 'a;

  /// Apply a description/type edit and bump `updated_at`.
  fn update_item(
    &self,
    id: ItemId,
    patch: ItemPatch,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Item, Self::Error>> + Send + '_;

  /// All items, most recently updated first.
  fn list_items(
    &self,
  ) -> impl Future<Output = Result<Vec<Item>, Self::Error>> + Send + '_;

  fn items_at_location<'a>(
    &'a self,
    location_id: &'a LocationId,
  ) -> impl Future<Output = Result<Vec<Item>, Self::Error>> + Send + 'a;

  fn items_by_type<'a>(
    &'a self,
    kind: &'a str,
  ) -> impl Future<Output = Result<Vec<Item>, Self::Error>> + Send + 'a;

  fn items_by_description_prefix<'a>(
    &'a self,
    prefix: &'a str,
  ) -> impl Future<Output = Result<Vec<Item>, Self::Error>> + Send + 'a;

  /// Substring match over description or id, most recently updated first.
  fn search_items<'a>(
    &'a self,
    text: &'a str,
  ) -> impl Future<Output = Result<Vec<Item>, Self::Error>> + Send + 'a;

  // ── Ledger ────────────────────────────────────────────────────────────

  /// Apply `plan` atomically: update the item if it still matches the plan's
  /// guard, then append the entry. Fails with `Conflict` on a stale guard and
  /// `InvalidTimestamp` on a backfill older than the ledger head; nothing is
  /// written in either case.
  fn commit_movement(
    &self,
    plan: MovementPlan,
  ) -> impl Future<Output = Result<Movement, Self::Error>> + Send + '_;

  /// Ledger entries for one item, oldest first.
  fn history<'a>(
    &'a self,
    item_id: &'a ItemId,
  ) -> impl Future<Output = Result<Vec<Movement>, Self::Error>> + Send + 'a;

  /// The newest `limit` entries, by timestamp then id, descending.
  fn recent(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Movement>, Self::Error>> + Send + '_;

  /// The newest entry overall, or for one item.
  fn last_movement<'a>(
    &'a self,
    item_id: Option<&'a ItemId>,
  ) -> impl Future<Output = Result<Option<Movement>, Self::Error>> + Send + 'a;
}

//! [`InventoryService`]: the single entry point for reads and writes.
//!
//! The service validates every request before anything is written, then hands
//! the store one atomic unit of work. Movements of the same item are
//! serialized by a per-item lock; location writes share one lock so two
//! concurrent reparents cannot together close a cycle.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::{
  Entity, Error, Result,
  clock::{Clock, SystemClock},
  id::{ItemId, LocationId},
  item::{Item, ItemPatch, NewItem},
  location::{Location, LocationPatch, NewLocation, SINK_LOCATIONS, is_seeded_sink},
  movement::{Action, Movement, MovementRequest, NewMovement, plan_movement, plan_revert},
  store::InventoryStore,
};

pub struct InventoryService<S, C = SystemClock> {
  store:         S,
  clock:         C,
  item_locks:    Mutex<HashMap<ItemId, Arc<tokio::sync::Mutex<()>>>>,
  location_lock: tokio::sync::Mutex<()>,
}

impl<S> InventoryService<S>
where
  S: InventoryStore,
  Error: From<S::Error>,
{
  pub fn new(store: S) -> Self { Self::with_clock(store, SystemClock) }
}

impl<S, C> InventoryService<S, C>
where
  S: InventoryStore,
  C: Clock,
  Error: From<S::Error>,
{
  pub fn with_clock(store: S, clock: C) -> Self {
    Self {
      store,
      clock,
      item_locks: Mutex::new(HashMap::new()),
      location_lock: tokio::sync::Mutex::new(()),
    }
  }

  pub fn store(&self) -> &S { &self.store }

  async fn lock_item(&self, id: &ItemId) -> OwnedMutexGuard<()> {
    let lock = {
      let mut locks =
        self.item_locks.lock().unwrap_or_else(PoisonError::into_inner);
      // Drop locks nobody holds or waits on.
      locks.retain(|_, l| Arc::strong_count(l) > 1);
      locks.entry(id.clone()).or_default().clone()
    };
    lock.lock_owned().await
  }

  // ── Startup ───────────────────────────────────────────────────────────

  /// Insert the permanent sink locations that are missing. Returns how many
  /// were written; running it again writes nothing.
  pub async fn seed(&self) -> Result<usize> {
    let now = self.clock.now();
    let mut inserted = 0;
    for sink in SINK_LOCATIONS {
      if self
        .store
        .insert_location_if_absent(sink.to_location(now))
        .await?
      {
        debug!(location_id = sink.id, "seeded sink location");
        inserted += 1;
      }
    }
    info!(inserted, "sink locations ready");
    Ok(inserted)
  }

  // ── Locations ─────────────────────────────────────────────────────────

  pub async fn create_location(&self, new: NewLocation) -> Result<Location> {
    let _guard = self.location_lock.lock().await;
    let location = self
      .store
      .insert_location(new.into_location(self.clock.now()))
      .await?;
    info!(
      location_id = %location.id,
      kind = %location.kind,
      parent_id = ?location.parent_id,
      "location created",
    );
    Ok(location)
  }

  /// Return the existing location, or create a root location of `kind`.
  pub async fn ensure_location(
    &self,
    id: impl Into<LocationId>,
    kind: impl Into<String>,
  ) -> Result<Location> {
    let id = id.into();
    let _guard = self.location_lock.lock().await;
    let candidate = NewLocation::new(id.clone(), kind).into_location(self.clock.now());
    if self.store.insert_location_if_absent(candidate).await? {
      info!(location_id = %id, "location created on first use");
    }
    self
      .store
      .get_location(&id)
      .await?
      .ok_or_else(|| Error::location_not_found(id.into_inner()))
  }

  pub async fn resolve(&self, id: &LocationId) -> Result<Location> {
    self
      .store
      .get_location(id)
      .await?
      .ok_or_else(|| Error::location_not_found(id.as_str()))
  }

  pub async fn list_locations(&self) -> Result<Vec<Location>> {
    Ok(self.store.list_locations().await?)
  }

  pub async fn list_children(&self, id: &LocationId) -> Result<Vec<Location>> {
    self.resolve(id).await?;
    Ok(self.store.list_children(id).await?)
  }

  /// Nearest ancestor first.
  pub async fn ancestors(&self, id: &LocationId) -> Result<Vec<Location>> {
    Ok(self.store.ancestors(id).await?)
  }

  pub async fn is_sink_location(&self, id: &LocationId) -> Result<bool> {
    if is_seeded_sink(id) {
      return Ok(true);
    }
    Ok(self.resolve(id).await?.is_sink())
  }

  pub async fn update_location(
    &self,
    id: LocationId,
    patch: LocationPatch,
  ) -> Result<Location> {
    let _guard = self.location_lock.lock().await;
    let location = self.store.update_location(id, patch).await?;
    info!(
      location_id = %location.id,
      parent_id = ?location.parent_id,
      "location updated",
    );
    Ok(location)
  }

  pub async fn delete_location(&self, id: LocationId) -> Result<()> {
    let _guard = self.location_lock.lock().await;
    self.store.delete_location(id.clone()).await?;
    info!(location_id = %id, "location deleted");
    Ok(())
  }

  // ── Items ─────────────────────────────────────────────────────────────

  fn prepare_item(&self, new: NewItem) -> Result<Item> {
    let id = new.id.clone().unwrap_or_else(ItemId::generate);
    if let Some(q) = new.quantity
      && q < 0
    {
      return Err(Error::InvalidQuantity {
        item_id:   id.into_inner(),
        requested: Some(q),
        available: None,
      });
    }
    Ok(new.into_item(id, self.clock.now()))
  }

  /// Create an item at its initial location without a ledger entry.
  pub async fn create_item(&self, new: NewItem) -> Result<Item> {
    let item = self.store.insert_item(self.prepare_item(new)?).await?;
    info!(
      item_id = %item.id,
      location_id = %item.current_location_id,
      quantity = ?item.quantity,
      "item created",
    );
    Ok(item)
  }

  /// Create an item and record its arrival as a `receive` movement.
  pub async fn receive_item(
    &self,
    new: NewItem,
    transcript: Option<String>,
    notes: Option<String>,
  ) -> Result<(Item, Movement)> {
    let item = self.prepare_item(new)?;
    let entry = NewMovement {
      item_id: item.id.clone(),
      from_location_id: None,
      to_location_id: Some(item.current_location_id.clone()),
      quantity: item.quantity,
      action: Action::Receive,
      transcript,
      notes,
      timestamp: item.created_at,
      backfilled: false,
    };
    let (item, movement) =
      self.store.insert_item_with_movement(item, entry).await?;
    info!(
      item_id = %item.id,
      location_id = %item.current_location_id,
      movement_id = movement.id,
      "item received",
    );
    Ok((item, movement))
  }

  pub async fn get(&self, id: &ItemId) -> Result<Item> {
    self
      .store
      .get_item(id)
      .await?
      .ok_or_else(|| Error::item_not_found(id.as_str()))
  }

  pub async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<Item> {
    let _guard = self.lock_item(&id).await;
    let item = self.store.update_item(id, patch, self.clock.now()).await?;
    debug!(item_id = %item.id, "item metadata updated");
    Ok(item)
  }

  pub async fn list_items(&self) -> Result<Vec<Item>> {
    Ok(self.store.list_items().await?)
  }

  pub async fn search_items(&self, text: &str) -> Result<Vec<Item>> {
    Ok(self.store.search_items(text).await?)
  }

  pub async fn query_by_location(&self, id: &LocationId) -> Result<Vec<Item>> {
    Ok(self.store.items_at_location(id).await?)
  }

  pub async fn query_by_type(&self, kind: &str) -> Result<Vec<Item>> {
    Ok(self.store.items_by_type(kind).await?)
  }

  pub async fn query_by_description_prefix(
    &self,
    prefix: &str,
  ) -> Result<Vec<Item>> {
    Ok(self.store.items_by_description_prefix(prefix).await?)
  }

  // ── Movements ─────────────────────────────────────────────────────────

  /// Move an item and append the ledger entry describing it, atomically.
  ///
  /// All validation happens before the store is asked to write. The call is
  /// not retried; re-sending the same request moves the item again.
  pub async fn record_movement(&self, request: MovementRequest) -> Result<Movement> {
    let _guard = self.lock_item(&request.item_id).await;

    let item = self.get(&request.item_id).await?;
    let to = self
      .store
      .get_location(&request.to_location_id)
      .await?
      .ok_or_else(|| Error::InvalidLocation {
        id:     request.to_location_id.to_string(),
        reason: "location does not exist".to_owned(),
      })?;

    let plan = plan_movement(&item, &to, request, self.clock.now())?;
    let movement = self.store.commit_movement(plan).await.map_err(|e| {
      let e = Error::from(e);
      if !e.is_validation() {
        warn!(item_id = %item.id, error = %e, "movement not committed");
      }
      e
    })?;

    info!(
      movement_id = movement.id,
      item_id = %movement.item_id,
      from = ?movement.from_location_id,
      to = ?movement.to_location_id,
      quantity = ?movement.quantity,
      action = %movement.action,
      sink = to.is_sink(),
      "movement recorded",
    );
    Ok(movement)
  }

  /// Undo the most recent movement of `item_id` by appending a compensating
  /// `revert` entry. The ledger itself is never rewritten.
  pub async fn undo_last(
    &self,
    item_id: &ItemId,
    transcript: Option<String>,
  ) -> Result<Movement> {
    self.revert(item_id, None, transcript).await
  }

  /// Undo the newest entry in the whole ledger, whichever item it moved.
  pub async fn undo_latest(&self, transcript: Option<String>) -> Result<Movement> {
    let latest = self
      .store
      .last_movement(None)
      .await?
      .ok_or_else(|| Error::NotFound {
        entity: Entity::Movement,
        id:     "latest".to_owned(),
      })?;
    self.revert(&latest.item_id, Some(latest.id), transcript).await
  }

  /// Revert the newest entry of `item_id`. With `expected`, that entry must
  /// still be the one the caller saw.
  async fn revert(
    &self,
    item_id: &ItemId,
    expected: Option<i64>,
    transcript: Option<String>,
  ) -> Result<Movement> {
    let _guard = self.lock_item(item_id).await;

    let item = self.get(item_id).await?;
    let last = self
      .store
      .last_movement(Some(item_id))
      .await?
      .ok_or_else(|| Error::NotFound {
        entity: Entity::Movement,
        id:     item_id.to_string(),
      })?;
    if expected.is_some_and(|id| id != last.id) {
      return Err(Error::Conflict { item_id: item_id.to_string() });
    }

    let plan = plan_revert(&item, &last, transcript, self.clock.now())?;
    let target = &plan.transition.location_id;
    if self.store.get_location(target).await?.is_none() {
      return Err(Error::InvalidLocation {
        id:     target.to_string(),
        reason: "revert target no longer exists".to_owned(),
      });
    }

    let movement = self.store.commit_movement(plan).await?;
    info!(
      movement_id = movement.id,
      reverted = last.id,
      item_id = %item_id,
      "movement reverted",
    );
    Ok(movement)
  }

  pub async fn history(&self, item_id: &ItemId) -> Result<Vec<Movement>> {
    Ok(self.store.history(item_id).await?)
  }

  pub async fn recent(&self, limit: usize) -> Result<Vec<Movement>> {
    Ok(self.store.recent(limit).await?)
  }

  pub async fn last_movement(
    &self,
    item_id: Option<&ItemId>,
  ) -> Result<Option<Movement>> {
    Ok(self.store.last_movement(item_id).await?)
  }
}

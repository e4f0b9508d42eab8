//! [`SqliteStore`]: the SQLite implementation of [`InventoryStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::{
  OptionalExtension as _, TransactionBehavior, params, params_from_iter,
  types::Value,
};
use tracing::debug;

use shelf_core::{
  Error as CoreError,
  id::{ItemId, LocationId},
  item::{Item, ItemPatch},
  location::{Location, LocationPatch, ancestors},
  movement::{Movement, MovementPlan, NewMovement},
  store::InventoryStore,
};

use crate::{
  Error, Result,
  encode::{
    ITEM_COLUMNS, LOCATION_COLUMNS, MOVEMENT_COLUMNS, RawItem, RawLocation,
    RawMovement, like_escape, normalize_dt,
  },
  ops,
  schema::SCHEMA,
};

/// Upper bound on any single storage call unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// An inventory store backed by a single SQLite file.
///
/// Clones share one reference-counted connection, so all calls run in order
/// on one database thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  timeout: Duration,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_timeout(path, DEFAULT_TIMEOUT).await
  }

  /// Like [`open`](Self::open), bounding every call by `timeout`.
  pub async fn open_with_timeout(
    path: impl AsRef<Path>,
    timeout: Duration,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, timeout).await
  }

  /// Open an empty in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, DEFAULT_TIMEOUT).await
  }

  /// The same database, with every call bounded by `timeout` instead.
  pub fn with_timeout(self, timeout: Duration) -> Self { Self { timeout, ..self } }

  async fn init(conn: tokio_rusqlite::Connection, timeout: Duration) -> Result<Self> {
    let store = Self { conn, timeout };
    store
      .call(move |conn| {
        conn.busy_timeout(timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    debug!(?timeout, "sqlite store ready");
    Ok(store)
  }

  /// Run `function` on the database thread, giving up after the configured
  /// timeout.
  async fn call<F, R>(&self, function: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R>
      + Send
      + 'static,
    R: Send + 'static,
  {
    tokio::time::timeout(self.timeout, self.conn.call(function))
      .await
      .map_err(|_| Error::Timeout(self.timeout))?
      .map_err(Error::from)
  }

  /// Run `body` inside one immediate transaction, committing only when it
  /// returns an inner `Ok`.
  async fn transact<F, R>(&self, body: F) -> Result<R>
  where
    F: FnOnce(&rusqlite::Connection) -> ops::TxResult<R> + Send + 'static,
    R: Send + 'static,
  {
    let verdict = self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let verdict = body(&tx)?;
        if verdict.is_ok() {
          tx.commit()?;
        }
        Ok(verdict)
      })
      .await?;
    Ok(verdict?)
  }

  async fn select_items(
    &self,
    filter: &'static str,
    args: Vec<Value>,
  ) -> Result<Vec<Item>> {
    let raws: Vec<RawItem> = self
      .call(move |conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {ITEM_COLUMNS} FROM items {filter}"))?;
        let rows = stmt
          .query_map(params_from_iter(args), RawItem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawItem::into_item).collect()
  }

  async fn select_locations(
    &self,
    filter: &'static str,
    args: Vec<Value>,
  ) -> Result<Vec<Location>> {
    let raws: Vec<RawLocation> = self
      .call(move |conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {LOCATION_COLUMNS} FROM locations {filter}"))?;
        let rows = stmt
          .query_map(params_from_iter(args), RawLocation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawLocation::into_location).collect()
  }

  async fn select_movements(
    &self,
    filter: &'static str,
    args: Vec<Value>,
  ) -> Result<Vec<Movement>> {
    let raws: Vec<RawMovement> = self
      .call(move |conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {MOVEMENT_COLUMNS} FROM movements {filter}"))?;
        let rows = stmt
          .query_map(params_from_iter(args), RawMovement::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawMovement::into_movement).collect()
  }

  /// Run raw SQL against the connection; tests use it to inject faults.
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await
  }
}

// ─── InventoryStore impl ─────────────────────────────────────────────────────

impl InventoryStore for SqliteStore {
  type Error = Error;

  // ── Locations ─────────────────────────────────────────────────────────────

  async fn insert_location(&self, mut location: Location) -> Result<Location> {
    location.created_at = normalize_dt(location.created_at);
    let row = location.clone();
    self
      .transact(move |conn| ops::insert_location(conn, &row))
      .await?;
    Ok(location)
  }

  async fn insert_location_if_absent(&self, mut location: Location) -> Result<bool> {
    location.created_at = normalize_dt(location.created_at);
    self
      .transact(move |conn| {
        if ops::load_location(conn, &location.id)?.is_some() {
          return Ok(Ok(false));
        }
        Ok(ops::insert_location(conn, &location)?.map(|()| true))
      })
      .await
  }

  async fn get_location(&self, id: &LocationId) -> Result<Option<Location>> {
    let id = id.clone();
    self.call(move |conn| ops::load_location(conn, &id)).await
  }

  async fn list_locations(&self) -> Result<Vec<Location>> {
    self.select_locations("ORDER BY id", vec![]).await
  }

  async fn list_children(&self, id: &LocationId) -> Result<Vec<Location>> {
    self
      .select_locations(
        "WHERE parent_id = ?1 ORDER BY id",
        vec![Value::from(id.to_string())],
      )
      .await
  }

  async fn ancestors(&self, id: &LocationId) -> Result<Vec<Location>> {
    let id = id.clone();
    let chain = self
      .call(move |conn| {
        let Some(start) = ops::load_location(conn, &id)? else {
          return Ok(Err(CoreError::location_not_found(id.into_inner())));
        };
        ancestors(&start, |id| ops::load_location(conn, id))
      })
      .await??;
    Ok(chain)
  }

  async fn update_location(
    &self,
    id: LocationId,
    patch: LocationPatch,
  ) -> Result<Location> {
    self
      .transact(move |conn| {
        let Some(mut location) = ops::load_location(conn, &id)? else {
          return Ok(Err(CoreError::location_not_found(id.into_inner())));
        };
        patch.apply(&mut location);
        Ok(ops::update_location(conn, &location)?.map(|()| location))
      })
      .await
  }

  async fn delete_location(&self, id: LocationId) -> Result<()> {
    self
      .transact(move |conn| ops::delete_location(conn, &id))
      .await
  }

  // ── Items ─────────────────────────────────────────────────────────────────

  async fn insert_item(&self, mut item: Item) -> Result<Item> {
    item.created_at = normalize_dt(item.created_at);
    item.updated_at = normalize_dt(item.updated_at);
    let row = item.clone();
    self.transact(move |conn| ops::insert_item(conn, &row)).await?;
    Ok(item)
  }

  async fn insert_item_with_movement(
    &self,
    mut item: Item,
    entry: NewMovement,
  ) -> Result<(Item, Movement)> {
    item.created_at = normalize_dt(item.created_at);
    item.updated_at = normalize_dt(item.updated_at);
    let row = item.clone();
    let movement = self
      .transact(move |conn| {
        if let Err(e) = ops::insert_item(conn, &row)? {
          return Ok(Err(e));
        }
        ops::append_movement(conn, entry)
      })
      .await?;
    Ok((item, movement))
  }

  async fn get_item(&self, id: &ItemId) -> Result<Option<Item>> {
    let id = id.clone();
    self.call(move |conn| ops::load_item(conn, &id)).await
  }

  async fn update_item(
    &self,
    id: ItemId,
    patch: ItemPatch,
    now: DateTime<Utc>,
  ) -> Result<Item> {
    let now = normalize_dt(now);
    self
      .transact(move |conn| {
        let Some(mut item) = ops::load_item(conn, &id)? else {
          return Ok(Err(CoreError::item_not_found(id.into_inner())));
        };
        patch.apply(&mut item, now);
        ops::update_item_metadata(conn, &item)?;
        Ok(Ok(item))
      })
      .await
  }

  async fn list_items(&self) -> Result<Vec<Item>> {
    self.select_items("ORDER BY updated_at DESC, id", vec![]).await
  }

  async fn items_at_location(&self, location_id: &LocationId) -> Result<Vec<Item>> {
    self
      .select_items(
        "WHERE current_location_id = ?1 ORDER BY id",
        vec![Value::from(location_id.to_string())],
      )
      .await
  }

  async fn items_by_type(&self, kind: &str) -> Result<Vec<Item>> {
    self
      .select_items(
        "WHERE type = ?1 ORDER BY id",
        vec![Value::from(kind.to_owned())],
      )
      .await
  }

  async fn items_by_description_prefix(&self, prefix: &str) -> Result<Vec<Item>> {
    let pattern = format!("{}%", like_escape(prefix));
    self
      .select_items(
        "WHERE description LIKE ?1 ESCAPE '\\' ORDER BY description, id",
        vec![Value::from(pattern)],
      )
      .await
  }

  async fn search_items(&self, text: &str) -> Result<Vec<Item>> {
    let pattern = format!("%{}%", like_escape(text));
    self
      .select_items(
        "WHERE description LIKE ?1 ESCAPE '\\' OR id LIKE ?1 ESCAPE '\\'
         ORDER BY updated_at DESC, id",
        vec![Value::from(pattern)],
      )
      .await
  }

  // ── Ledger ────────────────────────────────────────────────────────────────

  async fn commit_movement(&self, plan: MovementPlan) -> Result<Movement> {
    let movement = self
      .transact(move |conn| {
        if let Err(e) = ops::apply_transition(conn, &plan.transition)? {
          return Ok(Err(e));
        }
        ops::append_movement(conn, plan.entry)
      })
      .await?;
    debug!(
      movement_id = movement.id,
      item_id = %movement.item_id,
      "movement committed",
    );
    Ok(movement)
  }

  async fn history(&self, item_id: &ItemId) -> Result<Vec<Movement>> {
    self
      .select_movements(
        "WHERE item_id = ?1 ORDER BY id ASC",
        vec![Value::from(item_id.to_string())],
      )
      .await
  }

  async fn recent(&self, limit: usize) -> Result<Vec<Movement>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    self
      .select_movements(
        "ORDER BY timestamp DESC, id DESC LIMIT ?1",
        vec![Value::from(limit)],
      )
      .await
  }

  async fn last_movement(&self, item_id: Option<&ItemId>) -> Result<Option<Movement>> {
    let item_id = item_id.map(ItemId::to_string);
    let raw: Option<RawMovement> = self
      .call(move |conn| {
        let sql = format!(
          "SELECT {MOVEMENT_COLUMNS} FROM movements
            WHERE ?1 IS NULL OR item_id = ?1
            ORDER BY id DESC LIMIT 1"
        );
        Ok(
          conn
            .query_row(&sql, params![item_id], RawMovement::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawMovement::into_movement).transpose()
  }
}

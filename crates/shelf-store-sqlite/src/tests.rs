//! Integration tests for `InventoryService` over `SqliteStore` against an
//! in-memory database.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, TimeZone as _, Utc};
use shelf_core::{
  Entity, Error, InventoryService,
  clock::ManualClock,
  id::{ItemId, LocationId},
  item::{ItemPatch, NewItem},
  location::{CUSTOMER, IN_USE, LocationPatch, NewLocation, TRASH},
  movement::{Action, MovementRequest},
};

use crate::SqliteStore;

type Service = InventoryService<SqliteStore, Arc<ManualClock>>;

fn t0() -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000, 0).unwrap() }

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// A seeded service on a manual clock, with `BIN-001` holding ten `PART-42`.
async fn stocked() -> (Service, Arc<ManualClock>) {
  let clock = Arc::new(ManualClock::new(t0()));
  let svc = InventoryService::with_clock(store().await, clock.clone());
  svc.seed().await.unwrap();
  svc
    .create_location(NewLocation::new("BIN-001", "bin"))
    .await
    .unwrap();
  svc
    .create_item(NewItem::new("PART-42", "laser diode", "BIN-001").with_quantity(10))
    .await
    .unwrap();
  (svc, clock)
}

fn ship(to: &str, quantity: i64) -> MovementRequest {
  MovementRequest::new("PART-42", to, Action::Ship).with_quantity(quantity)
}

// ─── Seeding ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn seed_is_idempotent() {
  let svc = InventoryService::new(store().await);
  assert_eq!(svc.seed().await.unwrap(), 3);
  assert_eq!(svc.seed().await.unwrap(), 0);

  let all = svc.list_locations().await.unwrap();
  assert_eq!(all.len(), 3);
  for id in [TRASH, CUSTOMER, IN_USE] {
    let location = svc.resolve(&LocationId::from(id)).await.unwrap();
    assert!(location.parent_id.is_none());
    assert!(svc.is_sink_location(&location.id).await.unwrap());
  }
  assert_eq!(
    svc.resolve(&LocationId::from(TRASH)).await.unwrap().kind,
    "disposal"
  );
}

#[tokio::test]
async fn seed_keeps_existing_sink_rows() {
  let (svc, clock) = stocked().await;
  let before = svc.resolve(&LocationId::from(CUSTOMER)).await.unwrap();
  clock.advance(TimeDelta::hours(1));
  svc.seed().await.unwrap();
  let after = svc.resolve(&LocationId::from(CUSTOMER)).await.unwrap();
  assert_eq!(before, after);
}

// ─── Locations ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_unknown_location_is_not_found() {
  let (svc, _) = stocked().await;
  let err = svc.resolve(&LocationId::from("UNKNOWN-BIN")).await.unwrap_err();
  assert!(matches!(
    err,
    Error::NotFound { entity: Entity::Location, ref id } if id == "UNKNOWN-BIN"
  ));
}

#[tokio::test]
async fn create_location_rejects_duplicates_and_missing_parents() {
  let (svc, _) = stocked().await;

  let dup = svc
    .create_location(NewLocation::new("BIN-001", "bin"))
    .await
    .unwrap_err();
  assert!(matches!(dup, Error::DuplicateId { entity: Entity::Location, .. }));

  let orphan = svc
    .create_location(NewLocation::new("BIN-002", "bin").with_parent("NOWHERE"))
    .await
    .unwrap_err();
  assert!(matches!(
    orphan,
    Error::InvalidParent { ref parent_id, .. } if parent_id == "NOWHERE"
  ));
  assert!(svc.resolve(&LocationId::from("BIN-002")).await.is_err());
}

#[tokio::test]
async fn sinks_cannot_be_parents() {
  let (svc, _) = stocked().await;
  let err = svc
    .create_location(NewLocation::new("SHELF-9", "shelf").with_parent(TRASH))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidParent { .. }));

  let err = svc
    .update_location(
      LocationId::from(CUSTOMER),
      LocationPatch::reparent(Some(LocationId::from("BIN-001"))),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidParent { .. }));
}

#[tokio::test]
async fn reparent_rejects_cycles() {
  let (svc, _) = stocked().await;
  svc
    .create_location(NewLocation::new("ROOM-A", "room"))
    .await
    .unwrap();
  svc
    .create_location(NewLocation::new("RACK-1", "rack").with_parent("ROOM-A"))
    .await
    .unwrap();
  svc
    .create_location(NewLocation::new("SHELF-1", "shelf").with_parent("RACK-1"))
    .await
    .unwrap();

  let err = svc
    .update_location(
      LocationId::from("ROOM-A"),
      LocationPatch::reparent(Some(LocationId::from("SHELF-1"))),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidParent { .. }));

  let err = svc
    .update_location(
      LocationId::from("RACK-1"),
      LocationPatch::reparent(Some(LocationId::from("RACK-1"))),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidParent { .. }));

  // Still a chain rooted at ROOM-A.
  let room = svc.resolve(&LocationId::from("ROOM-A")).await.unwrap();
  assert!(room.parent_id.is_none());
  let chain = svc.ancestors(&LocationId::from("SHELF-1")).await.unwrap();
  let ids: Vec<_> = chain.iter().map(|l| l.id.as_str()).collect();
  assert_eq!(ids, ["RACK-1", "ROOM-A"]);
}

#[tokio::test]
async fn reparent_and_children() {
  let (svc, _) = stocked().await;
  svc
    .create_location(NewLocation::new("RACK-1", "rack").with_room("workshop"))
    .await
    .unwrap();

  let moved = svc
    .update_location(
      LocationId::from("BIN-001"),
      LocationPatch::reparent(Some(LocationId::from("RACK-1"))),
    )
    .await
    .unwrap();
  assert_eq!(moved.parent_id.as_ref().unwrap(), "RACK-1");

  let children = svc.list_children(&LocationId::from("RACK-1")).await.unwrap();
  assert_eq!(children.len(), 1);
  assert_eq!(children[0].id, "BIN-001");

  let err = svc
    .list_children(&LocationId::from("UNKNOWN-BIN"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));

  let retyped = svc
    .update_location(
      LocationId::from("RACK-1"),
      LocationPatch { kind: Some("disposal".into()), ..Default::default() },
    )
    .await
    .unwrap();
  assert!(retyped.is_sink());
  assert_eq!(svc.list_children(&retyped.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn terminal_typed_locations_nest_like_any_other() {
  let (svc, _) = stocked().await;
  svc
    .create_location(NewLocation::new("ROOM-A", "room"))
    .await
    .unwrap();

  let scrap = svc
    .create_location(NewLocation::new("SCRAP", "disposal").with_parent("ROOM-A"))
    .await
    .unwrap();
  assert!(svc.is_sink_location(&scrap.id).await.unwrap());

  svc
    .create_location(NewLocation::new("SCRAP-TRAY", "bin").with_parent("SCRAP"))
    .await
    .unwrap();
  let chain = svc.ancestors(&LocationId::from("SCRAP-TRAY")).await.unwrap();
  let ids: Vec<_> = chain.iter().map(|l| l.id.as_str()).collect();
  assert_eq!(ids, ["SCRAP", "ROOM-A"]);

  svc.delete_location(LocationId::from("SCRAP-TRAY")).await.unwrap();
  svc.delete_location(LocationId::from("SCRAP")).await.unwrap();
}

#[tokio::test]
async fn ensure_location_creates_once() {
  let (svc, clock) = stocked().await;
  let first = svc.ensure_location("DESK", "desk").await.unwrap();
  clock.advance(TimeDelta::minutes(5));
  let second = svc.ensure_location("DESK", "bench").await.unwrap();
  assert_eq!(first, second);
  assert_eq!(second.kind, "desk");

  let existing = svc.ensure_location("BIN-001", "rack").await.unwrap();
  assert_eq!(existing.kind, "bin");
}

#[tokio::test]
async fn delete_location_rules() {
  let (svc, _) = stocked().await;

  let err = svc.delete_location(LocationId::from(TRASH)).await.unwrap_err();
  assert!(matches!(err, Error::InvalidLocation { .. }));

  let err = svc
    .delete_location(LocationId::from("BIN-001"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::LocationInUse { .. }));

  svc
    .create_location(NewLocation::new("SPARE", "bin"))
    .await
    .unwrap();
  svc.delete_location(LocationId::from("SPARE")).await.unwrap();
  assert!(matches!(
    svc.resolve(&LocationId::from("SPARE")).await,
    Err(Error::NotFound { .. })
  ));

  let err = svc
    .delete_location(LocationId::from("SPARE"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn delete_location_refuses_ledger_references() {
  let (svc, _) = stocked().await;
  svc
    .create_location(NewLocation::new("BIN-002", "bin"))
    .await
    .unwrap();
  svc
    .record_movement(MovementRequest::new("PART-42", "BIN-002", Action::Move))
    .await
    .unwrap();
  svc
    .record_movement(MovementRequest::new("PART-42", "BIN-001", Action::Move))
    .await
    .unwrap();

  // BIN-002 is empty but still named by two ledger entries.
  let here = svc.query_by_location(&LocationId::from("BIN-002")).await.unwrap();
  assert!(here.is_empty());
  let err = svc
    .delete_location(LocationId::from("BIN-002"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::LocationInUse { .. }));
}

// ─── Items ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_item_validates_before_writing() {
  let (svc, _) = stocked().await;

  let dup = svc
    .create_item(NewItem::new("PART-42", "another", "BIN-001"))
    .await
    .unwrap_err();
  assert!(matches!(dup, Error::DuplicateId { entity: Entity::Item, .. }));

  let nowhere = svc
    .create_item(NewItem::new("PART-43", "resistor", "UNKNOWN-BIN"))
    .await
    .unwrap_err();
  assert!(matches!(nowhere, Error::InvalidLocation { .. }));

  let negative = svc
    .create_item(NewItem::new("PART-44", "capacitor", "BIN-001").with_quantity(-1))
    .await
    .unwrap_err();
  assert!(matches!(negative, Error::InvalidQuantity { .. }));

  assert_eq!(svc.list_items().await.unwrap().len(), 1);
  assert!(svc.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn receive_item_writes_item_and_entry() {
  let (svc, _) = stocked().await;
  let mut new = NewItem::new("unused", "hex key set", "BIN-001").with_kind("tool");
  new.id = None;

  let (item, movement) = svc
    .receive_item(new, Some("received hex keys".into()), None)
    .await
    .unwrap();
  assert!(item.id.as_str().starts_with("ITEM-"));
  assert_eq!(item.kind, "tool");
  assert_eq!(movement.item_id, item.id);
  assert!(movement.from_location_id.is_none());
  assert_eq!(movement.to_location_id.as_ref().unwrap(), "BIN-001");
  assert_eq!(movement.action, Action::Receive);
  assert_eq!(movement.transcript.as_deref(), Some("received hex keys"));

  assert_eq!(svc.get(&item.id).await.unwrap(), item);
  assert_eq!(svc.history(&item.id).await.unwrap(), vec![movement]);
}

#[tokio::test]
async fn receive_item_into_unknown_location_writes_nothing() {
  let (svc, _) = stocked().await;
  let err = svc
    .receive_item(NewItem::new("PART-50", "spacer", "UNKNOWN-BIN"), None, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidLocation { .. }));
  assert!(svc.get(&ItemId::from("PART-50")).await.is_err());
  assert!(svc.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_item_bumps_updated_at() {
  let (svc, clock) = stocked().await;
  let id = ItemId::from("PART-42");
  let before = svc.get(&id).await.unwrap();

  clock.advance(TimeDelta::seconds(30));
  let patch = ItemPatch { description: Some("blue laser diode".into()), kind: None };
  let after = svc.update_item(id.clone(), patch).await.unwrap();

  assert_eq!(after.description, "blue laser diode");
  assert_eq!(after.kind, before.kind);
  assert_eq!(after.created_at, before.created_at);
  assert_eq!(after.updated_at, t0() + TimeDelta::seconds(30));
  assert_eq!(svc.get(&id).await.unwrap(), after);

  let err = svc
    .update_item(ItemId::from("PART-99"), ItemPatch::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: Entity::Item, .. }));
}

#[tokio::test]
async fn queries_by_location_type_and_text() {
  let (svc, _) = stocked().await;
  svc
    .create_location(NewLocation::new("DRAWER-3", "drawer"))
    .await
    .unwrap();
  svc
    .create_item(NewItem::new("PART-7", "laser lens", "DRAWER-3").with_kind("optics"))
    .await
    .unwrap();
  svc
    .create_item(NewItem::new("PART-8", "50% duty timer", "DRAWER-3"))
    .await
    .unwrap();

  let in_drawer = svc
    .query_by_location(&LocationId::from("DRAWER-3"))
    .await
    .unwrap();
  let ids: Vec<_> = in_drawer.iter().map(|i| i.id.as_str()).collect();
  assert_eq!(ids, ["PART-7", "PART-8"]);

  let optics = svc.query_by_type("optics").await.unwrap();
  assert_eq!(optics.len(), 1);
  assert_eq!(optics[0].id, "PART-7");

  let lasers = svc.query_by_description_prefix("laser").await.unwrap();
  let ids: Vec<_> = lasers.iter().map(|i| i.id.as_str()).collect();
  assert_eq!(ids, ["PART-42", "PART-7"]);

  // Wildcards in the prefix are literal.
  let percent = svc.query_by_description_prefix("50%").await.unwrap();
  assert_eq!(percent.len(), 1);
  assert!(svc.query_by_description_prefix("5_%").await.unwrap().is_empty());

  let diodes = svc.search_items("diode").await.unwrap();
  assert_eq!(diodes.len(), 1);
  let by_id = svc.search_items("PART-").await.unwrap();
  assert_eq!(by_id.len(), 3);

  let nowhere = svc
    .query_by_location(&LocationId::from("UNKNOWN-BIN"))
    .await
    .unwrap();
  assert!(nowhere.is_empty());
}

// ─── Movements ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn ship_to_customer() {
  let (svc, _) = stocked().await;
  let id = ItemId::from("PART-42");

  let movement = svc.record_movement(ship(CUSTOMER, 3)).await.unwrap();
  assert_eq!(movement.from_location_id.as_ref().unwrap(), "BIN-001");
  assert_eq!(movement.to_location_id.as_ref().unwrap(), CUSTOMER);
  assert_eq!(movement.quantity, Some(3));
  assert_eq!(movement.action, Action::Ship);

  let item = svc.get(&id).await.unwrap();
  assert_eq!(item.current_location_id, CUSTOMER);
  assert_eq!(item.quantity, Some(10));

  let history = svc.history(&id).await.unwrap();
  assert_eq!(history, vec![movement]);
}

#[tokio::test]
async fn movement_to_unknown_location_changes_nothing() {
  let (svc, _) = stocked().await;
  let id = ItemId::from("PART-42");
  let before = svc.get(&id).await.unwrap();

  let err = svc.record_movement(ship("UNKNOWN-BIN", 1)).await.unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidLocation { ref id, .. } if id == "UNKNOWN-BIN"
  ));
  assert!(err.is_validation());

  assert_eq!(svc.get(&id).await.unwrap(), before);
  assert!(svc.history(&id).await.unwrap().is_empty());
}

#[tokio::test]
async fn movement_of_unknown_item_is_not_found() {
  let (svc, _) = stocked().await;
  let err = svc
    .record_movement(MovementRequest::new("PART-99", CUSTOMER, Action::Ship))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: Entity::Item, .. }));
}

#[tokio::test]
async fn movement_quantity_is_bounded_by_on_hand() {
  let (svc, _) = stocked().await;
  let err = svc.record_movement(ship(CUSTOMER, 11)).await.unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidQuantity { requested: Some(11), available: Some(10), .. }
  ));
  let err = svc.record_movement(ship(CUSTOMER, -2)).await.unwrap_err();
  assert!(matches!(err, Error::InvalidQuantity { .. }));
  assert!(svc.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn sequential_movements_chain() {
  let (svc, clock) = stocked().await;
  svc
    .create_location(NewLocation::new("BENCH", "bench"))
    .await
    .unwrap();

  let first = svc
    .record_movement(MovementRequest::new("PART-42", "BENCH", Action::Move))
    .await
    .unwrap();
  clock.advance(TimeDelta::seconds(1));
  let second = svc
    .record_movement(MovementRequest::new("PART-42", IN_USE, Action::Use))
    .await
    .unwrap();

  assert!(second.id > first.id);
  assert_eq!(second.from_location_id, first.to_location_id);
  assert_eq!(first.quantity, Some(10));

  let history = svc.history(&ItemId::from("PART-42")).await.unwrap();
  assert_eq!(history, vec![first, second.clone()]);

  // Cached state agrees with the ledger.
  let item = svc.get(&ItemId::from("PART-42")).await.unwrap();
  assert_eq!(Some(&item.current_location_id), second.to_location_id.as_ref());
  assert_eq!(item.updated_at, second.timestamp);
}

#[tokio::test]
async fn receive_and_adjust_quantities() {
  let (svc, _) = stocked().await;
  let id = ItemId::from("PART-42");

  svc
    .record_movement(
      MovementRequest::new("PART-42", "BIN-001", Action::Receive).with_quantity(5),
    )
    .await
    .unwrap();
  assert_eq!(svc.get(&id).await.unwrap().quantity, Some(15));

  let adjust = svc
    .record_movement(
      MovementRequest::new("PART-42", "BIN-001", Action::Adjust).with_quantity(12),
    )
    .await
    .unwrap();
  assert_eq!(adjust.quantity, Some(12));
  assert_eq!(svc.get(&id).await.unwrap().quantity, Some(12));

  let err = svc
    .record_movement(MovementRequest::new("PART-42", "BIN-001", Action::Adjust))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidQuantity { .. }));
}

#[tokio::test]
async fn recent_orders_ties_by_id() {
  let (svc, _) = stocked().await;
  svc
    .create_location(NewLocation::new("BIN-002", "bin"))
    .await
    .unwrap();
  // The clock never moves, so every entry shares one timestamp.
  let a = svc
    .record_movement(MovementRequest::new("PART-42", "BIN-002", Action::Move))
    .await
    .unwrap();
  let b = svc
    .record_movement(MovementRequest::new("PART-42", "BIN-001", Action::Move))
    .await
    .unwrap();
  let c = svc.record_movement(ship(CUSTOMER, 1)).await.unwrap();
  assert_eq!(a.timestamp, c.timestamp);

  let recent = svc.recent(2).await.unwrap();
  assert_eq!(recent, vec![c.clone(), b.clone()]);
  assert_eq!(svc.recent(10).await.unwrap(), vec![c.clone(), b, a]);
  assert!(svc.recent(0).await.unwrap().is_empty());

  assert_eq!(svc.last_movement(None).await.unwrap(), Some(c));
}

#[tokio::test]
async fn backfill_before_ledger_head_is_rejected() {
  let (svc, clock) = stocked().await;
  clock.advance(TimeDelta::hours(1));
  let head = svc.record_movement(ship(CUSTOMER, 1)).await.unwrap();

  let id = ItemId::from("PART-42");
  let before = svc.get(&id).await.unwrap();
  let err = svc
    .record_movement(
      MovementRequest::new("PART-42", TRASH, Action::Dispose).backfilled_at(t0()),
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidTimestamp { head: h, .. } if h == head.timestamp
  ));
  assert_eq!(svc.get(&id).await.unwrap(), before);
  assert_eq!(svc.history(&id).await.unwrap().len(), 1);

  let later = head.timestamp + TimeDelta::minutes(1);
  let entry = svc
    .record_movement(
      MovementRequest::new("PART-42", TRASH, Action::Dispose).backfilled_at(later),
    )
    .await
    .unwrap();
  assert_eq!(entry.timestamp, later);
}

#[tokio::test]
async fn clock_behind_ledger_head_is_clamped() {
  let (svc, clock) = stocked().await;
  clock.advance(TimeDelta::hours(1));
  let first = svc.record_movement(ship(CUSTOMER, 1)).await.unwrap();

  clock.set(t0());
  let second = svc
    .record_movement(MovementRequest::new("PART-42", TRASH, Action::Dispose))
    .await
    .unwrap();
  assert_eq!(second.timestamp, first.timestamp);
  assert!(second.id > first.id);
}

#[tokio::test]
async fn failed_append_rolls_back_the_item() {
  let (svc, _) = stocked().await;
  let id = ItemId::from("PART-42");
  let before = svc.get(&id).await.unwrap();

  svc
    .store()
    .execute_batch(
      "CREATE TRIGGER fail_append BEFORE INSERT ON movements
       BEGIN SELECT RAISE(ABORT, 'injected fault'); END;",
    )
    .await
    .unwrap();

  let err = svc.record_movement(ship(CUSTOMER, 3)).await.unwrap_err();
  assert!(matches!(err, Error::Storage(_)));
  assert!(!err.is_validation());
  assert_eq!(svc.get(&id).await.unwrap(), before);
  assert!(svc.recent(10).await.unwrap().is_empty());

  svc.store().execute_batch("DROP TRIGGER fail_append").await.unwrap();
  svc.record_movement(ship(CUSTOMER, 3)).await.unwrap();
  assert_eq!(svc.get(&id).await.unwrap().current_location_id, CUSTOMER);
}

#[tokio::test]
async fn ledger_rows_are_immutable() {
  let (svc, _) = stocked().await;
  svc.record_movement(ship(CUSTOMER, 3)).await.unwrap();

  assert!(
    svc
      .store()
      .execute_batch("UPDATE movements SET notes = 'edited'")
      .await
      .is_err()
  );
  assert!(svc.store().execute_batch("DELETE FROM movements").await.is_err());
  assert_eq!(svc.recent(10).await.unwrap().len(), 1);
  assert!(svc.recent(10).await.unwrap()[0].notes.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_movements_of_one_item_stay_linear() {
  let (svc, _) = stocked().await;
  svc
    .create_location(NewLocation::new("BIN-002", "bin"))
    .await
    .unwrap();
  let svc = Arc::new(svc);

  let tasks: Vec<_> = (0..16)
    .map(|i| {
      let svc = svc.clone();
      let to = if i % 2 == 0 { "BIN-002" } else { "BIN-001" };
      tokio::spawn(async move {
        svc
          .record_movement(MovementRequest::new("PART-42", to, Action::Move))
          .await
      })
    })
    .collect();
  for task in tasks {
    task.await.unwrap().unwrap();
  }

  let history = svc.history(&ItemId::from("PART-42")).await.unwrap();
  assert_eq!(history.len(), 16);
  assert_eq!(history[0].from_location_id.as_ref().unwrap(), "BIN-001");
  for pair in history.windows(2) {
    assert!(pair[1].id > pair[0].id);
    assert!(pair[1].timestamp >= pair[0].timestamp);
    assert_eq!(pair[1].from_location_id, pair[0].to_location_id);
  }
  let item = svc.get(&ItemId::from("PART-42")).await.unwrap();
  assert_eq!(
    Some(&item.current_location_id),
    history.last().unwrap().to_location_id.as_ref()
  );
}

#[tokio::test]
async fn custom_actions_round_trip_through_the_ledger() {
  let (svc, _) = stocked().await;
  let id = ItemId::from("PART-42");
  svc
    .create_location(NewLocation::new("LAB", "bench"))
    .await
    .unwrap();

  let calibrate = svc
    .record_movement(
      MovementRequest::new("PART-42", "LAB", Action::parse("Calibrate"))
        .with_quantity(3),
    )
    .await
    .unwrap();
  assert!(matches!(calibrate.action, Action::Custom(_)));
  assert_eq!(calibrate.action.as_str(), "Calibrate");

  // A known tag in any spelling is the known action, not a custom one.
  let received = svc
    .record_movement(
      MovementRequest::new("PART-42", "LAB", Action::from("RECEIVE")).with_quantity(3),
    )
    .await
    .unwrap();
  assert_eq!(received.action, Action::Receive);
  assert_eq!(svc.get(&id).await.unwrap().quantity, Some(13));

  assert_eq!(
    svc.history(&id).await.unwrap(),
    vec![calibrate, received.clone()]
  );

  svc.undo_last(&id, None).await.unwrap();
  let item = svc.get(&id).await.unwrap();
  assert_eq!(item.quantity, Some(10));
  assert_eq!(item.current_location_id, "LAB");
}

#[tokio::test]
async fn busy_connection_times_out_as_storage_error() {
  let (svc, _) = stocked().await;

  let busy = svc.store().clone();
  let hog = tokio::spawn(async move {
    busy
      .execute_batch(
        "WITH RECURSIVE n(x) AS (
           SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 50000000
         )
         SELECT count(*) FROM n;",
      )
      .await
  });
  tokio::time::sleep(Duration::from_millis(20)).await;

  let impatient = InventoryService::new(
    svc.store().clone().with_timeout(Duration::from_millis(5)),
  );
  let err = impatient.get(&ItemId::from("PART-42")).await.unwrap_err();
  assert!(!err.is_validation());
  let Error::Storage(source) = &err else {
    panic!("expected a storage error, got {err:?}");
  };
  assert!(matches!(
    source.downcast_ref::<crate::Error>(),
    Some(crate::Error::Timeout(_))
  ));
  hog.abort();
}

// ─── Undo ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn undo_moves_the_item_back() {
  let (svc, _) = stocked().await;
  let id = ItemId::from("PART-42");
  let shipped = svc.record_movement(ship(CUSTOMER, 3)).await.unwrap();

  let revert = svc.undo_last(&id, Some("undo".into())).await.unwrap();
  assert_eq!(revert.action, Action::Revert);
  assert_eq!(revert.from_location_id.as_ref().unwrap(), CUSTOMER);
  assert_eq!(revert.to_location_id.as_ref().unwrap(), "BIN-001");
  assert_eq!(revert.notes, Some(format!("reverts movement {}", shipped.id)));

  let item = svc.get(&id).await.unwrap();
  assert_eq!(item.current_location_id, "BIN-001");
  assert_eq!(item.quantity, Some(10));
  assert_eq!(svc.history(&id).await.unwrap(), vec![shipped, revert]);
}

#[tokio::test]
async fn undo_of_receive_sends_stock_to_trash() {
  let (svc, _) = stocked().await;
  let (item, _) = svc
    .receive_item(
      NewItem::new("PART-60", "washer", "BIN-001").with_quantity(5),
      None,
      None,
    )
    .await
    .unwrap();

  svc.undo_last(&item.id, None).await.unwrap();
  let item = svc.get(&item.id).await.unwrap();
  assert_eq!(item.current_location_id, TRASH);
  assert_eq!(item.quantity, Some(0));
}

#[tokio::test]
async fn undo_rules() {
  let (svc, _) = stocked().await;
  let id = ItemId::from("PART-42");

  let err = svc.undo_last(&id, None).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: Entity::Movement, .. }));

  svc
    .record_movement(
      MovementRequest::new("PART-42", "BIN-001", Action::Adjust).with_quantity(4),
    )
    .await
    .unwrap();
  let err = svc.undo_last(&id, None).await.unwrap_err();
  assert!(matches!(err, Error::NotRevertible { .. }));

  let err = svc
    .undo_last(&ItemId::from("PART-99"), None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: Entity::Item, .. }));
}

#[tokio::test]
async fn undo_is_one_level_deep() {
  let (svc, _) = stocked().await;
  let (item, _) = svc
    .receive_item(
      NewItem::new("PART-61", "spring", "BIN-001").with_quantity(5),
      None,
      None,
    )
    .await
    .unwrap();

  let revert = svc.undo_last(&item.id, None).await.unwrap();
  let err = svc.undo_last(&item.id, None).await.unwrap_err();
  assert!(matches!(
    err,
    Error::NotRevertible { movement_id, .. } if movement_id == revert.id
  ));

  let item = svc.get(&item.id).await.unwrap();
  assert_eq!(item.current_location_id, TRASH);
  assert_eq!(item.quantity, Some(0));
  assert_eq!(svc.history(&item.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn undo_latest_reverts_the_newest_entry_overall() {
  let (svc, _) = stocked().await;
  let err = svc.undo_latest(None).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: Entity::Movement, .. }));

  svc
    .create_item(NewItem::new("PART-70", "fuse", "BIN-001"))
    .await
    .unwrap();
  svc.record_movement(ship(CUSTOMER, 2)).await.unwrap();
  let used = svc
    .record_movement(MovementRequest::new("PART-70", IN_USE, Action::Use))
    .await
    .unwrap();

  let revert = svc.undo_latest(Some("undo".into())).await.unwrap();
  assert_eq!(revert.item_id, "PART-70");
  assert_eq!(revert.notes, Some(format!("reverts movement {}", used.id)));

  let fuse = svc.get(&ItemId::from("PART-70")).await.unwrap();
  assert_eq!(fuse.current_location_id, "BIN-001");
  let part = svc.get(&ItemId::from("PART-42")).await.unwrap();
  assert_eq!(part.current_location_id, CUSTOMER);

  // The newest entry is now a revert, which cannot itself be undone.
  let err = svc.undo_latest(None).await.unwrap_err();
  assert!(matches!(err, Error::NotRevertible { .. }));
}

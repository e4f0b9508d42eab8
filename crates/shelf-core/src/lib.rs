//! Domain types, the storage trait and the inventory service for shelf.
//!
//! Nothing here touches a database. Backends implement
//! [`store::InventoryStore`]; callers go through
//! [`service::InventoryService`], which owns every write path.

// Store implementations use `async fn` for the trait's `impl Future` methods.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod error;
pub mod id;
pub mod item;
pub mod location;
pub mod movement;
pub mod service;
pub mod store;

pub use error::{Entity, Error, Result};
pub use id::{ItemId, LocationId};
pub use service::InventoryService;

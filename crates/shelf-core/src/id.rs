//! String identifiers for locations and items.
//!
//! Ids are caller-chosen strings (`BIN-001`, `PART-42`), stable for the
//! lifetime of the record and never reused.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(String);

    impl $name {
      pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

      pub fn as_str(&self) -> &str { &self.0 }

      pub fn into_inner(self) -> String { self.0 }
    }

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
      }
    }

    impl From<&str> for $name {
      fn from(s: &str) -> Self { Self(s.to_owned()) }
    }

    impl From<String> for $name {
      fn from(s: String) -> Self { Self(s) }
    }

    impl AsRef<str> for $name {
      fn as_ref(&self) -> &str { &self.0 }
    }

    impl PartialEq<str> for $name {
      fn eq(&self, other: &str) -> bool { self.0 == other }
    }

    impl PartialEq<&str> for $name {
      fn eq(&self, other: &&str) -> bool { self.0 == *other }
    }
  };
}

string_id!(
  /// Identifier of a [`Location`](crate::location::Location).
  LocationId
);

string_id!(
  /// Identifier of an [`Item`](crate::item::Item).
  ItemId
);

impl ItemId {
  /// A fresh id for items received without a caller-chosen one.
  pub fn generate() -> Self {
    Self(format!("ITEM-{}", uuid::Uuid::new_v4().simple()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn generated_item_ids_are_prefixed_and_unique() {
    let a = ItemId::generate();
    let b = ItemId::generate();
    assert!(a.as_str().starts_with("ITEM-"));
    assert_ne!(a, b);
  }

  #[test]
  fn ids_serialize_as_plain_strings() {
    let id = LocationId::from("BIN-001");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"BIN-001\"");
    assert_eq!(id, "BIN-001");
  }
}

//! SQL schema for the shelf SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS locations (
    id          TEXT PRIMARY KEY,
    type        TEXT NOT NULL,   -- bin | rack | disposal | customer | ...
    room        TEXT,
    description TEXT,
    parent_id   TEXT REFERENCES locations(id),
    created_at  TEXT NOT NULL,
    CHECK (parent_id IS NULL OR parent_id != id)
);

CREATE TABLE IF NOT EXISTS items (
    id                  TEXT PRIMARY KEY,
    description         TEXT NOT NULL,
    type                TEXT NOT NULL,
    quantity            INTEGER CHECK (quantity IS NULL OR quantity >= 0),
    current_location_id TEXT NOT NULL REFERENCES locations(id),
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

-- Movements are strictly append-only.
-- AUTOINCREMENT keeps ids strictly increasing and never reused.
CREATE TABLE IF NOT EXISTS movements (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp        TEXT NOT NULL,   -- RFC 3339 UTC, fixed microseconds
    item_id          TEXT NOT NULL REFERENCES items(id),
    from_location_id TEXT REFERENCES locations(id),
    to_location_id   TEXT REFERENCES locations(id),
    quantity         INTEGER,
    action           TEXT NOT NULL,
    transcript       TEXT,
    notes            TEXT
);

CREATE TRIGGER IF NOT EXISTS movements_no_update
BEFORE UPDATE ON movements
BEGIN
    SELECT RAISE(ABORT, 'movements are append-only');
END;

CREATE TRIGGER IF NOT EXISTS movements_no_delete
BEFORE DELETE ON movements
BEGIN
    SELECT RAISE(ABORT, 'movements are append-only');
END;

CREATE INDEX IF NOT EXISTS idx_locations_parent     ON locations(parent_id);
CREATE INDEX IF NOT EXISTS idx_items_location       ON items(current_location_id);
CREATE INDEX IF NOT EXISTS idx_items_type           ON items(type);
CREATE INDEX IF NOT EXISTS idx_items_description    ON items(description);
CREATE INDEX IF NOT EXISTS idx_movements_timestamp  ON movements(timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_movements_item       ON movements(item_id);

PRAGMA user_version = 1;
";

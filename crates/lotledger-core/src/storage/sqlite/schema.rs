//! Database schema for the SQLite lot store.

use chrono::Utc;
use rusqlite::Connection;

use crate::error::{LedgerError, Result};

pub const FORMAT_VERSION: &str = "0.1";

/// Keys every initialised database carries in `meta`.
pub const REQUIRED_META_KEYS: [&str; 2] = ["format_version", "created_at"];

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- AUTOINCREMENT keeps identifiers monotonic and never reused, which makes
-- ascending lot_id a valid age order.
CREATE TABLE IF NOT EXISTS lots (
    lot_id INTEGER PRIMARY KEY AUTOINCREMENT,
    item TEXT NOT NULL,
    on_hand_qty INTEGER NOT NULL CHECK (on_hand_qty >= 0),
    staged_qty INTEGER NOT NULL CHECK (staged_qty >= 0),
    location TEXT,
    metadata_json TEXT,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS lots_item ON lots (item, lot_id);

CREATE TABLE IF NOT EXISTS ledger_entries (
    entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation_id TEXT NOT NULL,
    operation_kind TEXT NOT NULL
        CHECK (operation_kind IN ('STOCK', 'PICK', 'RESTOCK', 'ADJUST')),
    lot_id INTEGER NOT NULL,
    item TEXT NOT NULL,
    quantity_delta INTEGER NOT NULL,
    location_from TEXT,
    location_to TEXT,
    actor TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    work_order TEXT,

    FOREIGN KEY (lot_id) REFERENCES lots (lot_id)
);

CREATE INDEX IF NOT EXISTS ledger_entries_lot ON ledger_entries (lot_id, entry_id);
CREATE INDEX IF NOT EXISTS ledger_entries_item ON ledger_entries (item, entry_id);
CREATE INDEX IF NOT EXISTS ledger_entries_operation ON ledger_entries (operation_id);

CREATE TRIGGER IF NOT EXISTS ledger_entries_no_update
BEFORE UPDATE ON ledger_entries
BEGIN
    SELECT RAISE(ABORT, 'ledger entries are append-only');
END;

CREATE TRIGGER IF NOT EXISTS ledger_entries_no_delete
BEFORE DELETE ON ledger_entries
BEGIN
    SELECT RAISE(ABORT, 'ledger entries are append-only');
END;

CREATE TRIGGER IF NOT EXISTS lots_no_delete
BEFORE DELETE ON lots
BEGIN
    SELECT RAISE(ABORT, 'lots are never deleted');
END;
"#;

/// Create tables, indexes and triggers if missing, then stamp metadata.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let created_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES ('format_version', ?)",
        [FORMAT_VERSION],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES ('created_at', ?)",
        [created_at],
    )?;

    let version: String = conn.query_row(
        "SELECT value FROM meta WHERE key = 'format_version'",
        [],
        |row| row.get(0),
    )?;
    if version != FORMAT_VERSION {
        return Err(LedgerError::Storage(format!(
            "Unsupported format version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }

    Ok(())
}

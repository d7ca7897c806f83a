//! Raw row types for database queries.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::storage::types::{LedgerEntry, Lot, LotId, LotMetadata};

pub const LOT_COLUMNS: &str =
    "lot_id, item, on_hand_qty, staged_qty, location, metadata_json, created_at, last_modified";

pub const ENTRY_COLUMNS: &str = "entry_id, operation_id, operation_kind, lot_id, item, \
     quantity_delta, location_from, location_to, actor, timestamp, work_order";

/// Raw row data from the lots table, before parsing into domain types.
#[derive(Debug)]
pub struct LotRow {
    pub lot_id: i64,
    pub item: String,
    pub on_hand_qty: i64,
    pub staged_qty: i64,
    pub location: Option<String>,
    pub metadata_json: Option<String>,
    pub created_at: String,
    pub last_modified: String,
}

impl LotRow {
    /// Read a row selected with [`LOT_COLUMNS`].
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            lot_id: row.get(0)?,
            item: row.get(1)?,
            on_hand_qty: row.get(2)?,
            staged_qty: row.get(3)?,
            location: row.get(4)?,
            metadata_json: row.get(5)?,
            created_at: row.get(6)?,
            last_modified: row.get(7)?,
        })
    }
}

impl TryFrom<LotRow> for Lot {
    type Error = LedgerError;

    fn try_from(row: LotRow) -> Result<Self> {
        let metadata: LotMetadata = match row.metadata_json {
            Some(ref value) => serde_json::from_str(value)
                .map_err(|e| LedgerError::Storage(format!("Invalid metadata JSON: {}", e)))?,
            None => LotMetadata::default(),
        };

        Ok(Lot {
            id: LotId(row.lot_id),
            item: row.item,
            on_hand_qty: row.on_hand_qty,
            staged_qty: row.staged_qty,
            location: row.location,
            metadata,
            created_at: parse_timestamp(&row.created_at)?,
            last_modified: parse_timestamp(&row.last_modified)?,
        })
    }
}

/// Raw row data from the ledger_entries table.
#[derive(Debug)]
pub struct EntryRow {
    pub entry_id: i64,
    pub operation_id: String,
    pub operation_kind: String,
    pub lot_id: i64,
    pub item: String,
    pub quantity_delta: i64,
    pub location_from: Option<String>,
    pub location_to: Option<String>,
    pub actor: String,
    pub timestamp: String,
    pub work_order: Option<String>,
}

impl EntryRow {
    /// Read a row selected with [`ENTRY_COLUMNS`].
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            entry_id: row.get(0)?,
            operation_id: row.get(1)?,
            operation_kind: row.get(2)?,
            lot_id: row.get(3)?,
            item: row.get(4)?,
            quantity_delta: row.get(5)?,
            location_from: row.get(6)?,
            location_to: row.get(7)?,
            actor: row.get(8)?,
            timestamp: row.get(9)?,
            work_order: row.get(10)?,
        })
    }
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = LedgerError;

    fn try_from(row: EntryRow) -> Result<Self> {
        let operation_id = Uuid::parse_str(&row.operation_id)
            .map_err(|e| LedgerError::Storage(format!("Invalid operation UUID: {}", e)))?;
        let kind = row
            .operation_kind
            .parse()
            .map_err(|e| LedgerError::Storage(format!("Invalid operation kind: {}", e)))?;

        Ok(LedgerEntry {
            entry_id: row.entry_id,
            operation_id,
            kind,
            lot_id: LotId(row.lot_id),
            item: row.item,
            quantity_delta: row.quantity_delta,
            location_from: row.location_from,
            location_to: row.location_to,
            actor: row.actor,
            timestamp: parse_timestamp(&row.timestamp)?,
            work_order: row.work_order,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| LedgerError::Storage(format!("Invalid timestamp: {}", e)))?
        .with_timezone(&Utc))
}

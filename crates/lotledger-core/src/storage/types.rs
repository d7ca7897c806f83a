//! Core data types for the storage layer.
//!
//! These mirror the persisted table shape: one row per lot, one row per
//! ledger entry.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Lot identifier (part control number).
///
/// Assigned from a monotonic sequence and never reused, so ascending order
/// doubles as age order for FIFO allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(pub i64);

impl LotId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for LotId {
    fn from(value: i64) -> Self {
        LotId(value)
    }
}

impl ToSql for LotId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for LotId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(LotId)
    }
}

/// Descriptive attributes of a received batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotMetadata {
    /// Manufacturer part number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpn: Option<String>,

    /// Manufacturer date code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_code: Option<String>,

    /// Moisture-sensitivity level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msl: Option<String>,
}

impl LotMetadata {
    pub fn is_empty(&self) -> bool {
        self.mpn.is_none() && self.date_code.is_none() && self.msl.is_none()
    }
}

/// An inventory lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,

    /// Logical part identifier
    pub item: String,

    /// Quantity in warehouse storage, available to pick
    pub on_hand_qty: i64,

    /// Quantity checked out to the production floor
    pub staged_qty: i64,

    pub location: Option<String>,

    pub metadata: LotMetadata,

    pub created_at: DateTime<Utc>,

    pub last_modified: DateTime<Utc>,
}

/// A lot about to be created by a stock operation.
#[derive(Debug, Clone)]
pub struct NewLot {
    pub item: String,
    pub on_hand_qty: i64,
    pub location: Option<String>,
    pub metadata: LotMetadata,
    pub created_at: DateTime<Utc>,
}

/// A quantity change applied to one lot inside a transaction.
#[derive(Debug, Clone)]
pub struct LotDelta {
    pub on_hand: i64,
    pub staged: i64,

    /// New location, if the operation moves the lot
    pub location: Option<String>,

    pub at: DateTime<Utc>,
}

impl LotDelta {
    pub fn new(on_hand: i64, staged: i64, at: DateTime<Utc>) -> Self {
        Self {
            on_hand,
            staged,
            location: None,
            at,
        }
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }
}

/// Kind of quantity movement recorded by a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    /// Received into on-hand
    Stock,
    /// Moved from on-hand to staged
    Pick,
    /// Moved from staged back to on-hand
    Restock,
    /// Signed correction to on-hand
    Adjust,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Stock => "STOCK",
            OperationKind::Pick => "PICK",
            OperationKind::Restock => "RESTOCK",
            OperationKind::Adjust => "ADJUST",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STOCK" => Ok(OperationKind::Stock),
            "PICK" => Ok(OperationKind::Pick),
            "RESTOCK" => Ok(OperationKind::Restock),
            "ADJUST" => Ok(OperationKind::Adjust),
            other => Err(LedgerError::Validation(format!(
                "Unknown operation kind: {}",
                other
            ))),
        }
    }
}

/// An immutable transaction log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: i64,

    /// Groups every entry written by one operation
    pub operation_id: Uuid,

    pub kind: OperationKind,

    pub lot_id: LotId,

    pub item: String,

    /// Quantity moved in the direction named by `kind`; signed for ADJUST
    pub quantity_delta: i64,

    pub location_from: Option<String>,

    pub location_to: Option<String>,

    pub actor: String,

    pub timestamp: DateTime<Utc>,

    pub work_order: Option<String>,
}

/// A ledger entry about to be appended.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub lot_id: LotId,
    pub item: String,
    pub quantity_delta: i64,
    pub location_from: Option<String>,
    pub location_to: Option<String>,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub work_order: Option<String>,
}

/// Lots and the full transaction log, read at one point in time.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub lots: Vec<Lot>,
    pub entries: Vec<LedgerEntry>,
}

/// Filter for querying ledger entries.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub lot_id: Option<LotId>,

    pub item: Option<String>,

    pub kind: Option<OperationKind>,

    pub work_order: Option<String>,

    pub operation_id: Option<Uuid>,

    /// Return the most recent entries first
    pub newest_first: bool,

    /// Maximum number of results
    pub limit: Option<usize>,
}

impl EntryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lot(mut self, lot_id: LotId) -> Self {
        self.lot_id = Some(lot_id);
        self
    }

    pub fn item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    pub fn kind(mut self, kind: OperationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn work_order(mut self, work_order: impl Into<String>) -> Self {
        self.work_order = Some(work_order.into());
        self
    }

    pub fn operation(mut self, operation_id: Uuid) -> Self {
        self.operation_id = Some(operation_id);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

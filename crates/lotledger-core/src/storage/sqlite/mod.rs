//! SQLite storage backend.
//!
//! The database runs in WAL mode so readers never block the single writer.
//! Write transactions start with `BEGIN IMMEDIATE`, which takes the
//! database-wide write lock up front: every write transaction waits for the
//! one before it, whichever lots either touches. Contention surfaces as
//! `SQLITE_BUSY` after the busy timeout and is reported as
//! `LedgerError::Retryable`.

mod row;
mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension};

use crate::error::{LedgerError, Result};
use crate::storage::traits::{LotStore, StoreTxn};
use crate::storage::types::{
    EntryFilter, LedgerEntry, Lot, LotDelta, LotId, NewLedgerEntry, NewLot, StoreSnapshot,
};

use row::{EntryRow, LotRow, ENTRY_COLUMNS, LOT_COLUMNS};
use schema::REQUIRED_META_KEYS;

/// Idle connections kept for reuse; extra ones are closed on release.
const MAX_IDLE_CONNECTIONS: usize = 16;

/// SQLite-backed lot store.
pub struct SqliteLotStore {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    busy_timeout: Duration,
}

impl SqliteLotStore {
    /// Open (creating if needed) the database at `path`.
    ///
    /// `busy_timeout` bounds how long a write transaction waits for the
    /// database write lock before failing as retryable.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(LedgerError::Storage(format!(
                    "Directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        let conn = Self::connect(path, busy_timeout)?;
        schema::initialize(&conn)?;
        tracing::debug!(path = %path.display(), "opened lot store");

        Ok(Self {
            path: path.to_path_buf(),
            idle: Mutex::new(vec![conn]),
            busy_timeout,
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(path: &Path, busy_timeout: Duration) -> Result<Connection> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            return Err(LedgerError::Storage(format!(
                "Could not enable WAL journal (got {})",
                mode
            )));
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<Connection>> {
        // The pool holds no invariant a panic could break.
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take an idle connection or open a new one.
    fn checkout(&self) -> Result<PooledConnection<'_>> {
        let reused = self.lock_idle().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => Self::connect(&self.path, self.busy_timeout)?,
        };
        Ok(PooledConnection {
            store: self,
            conn: Some(conn),
        })
    }

    fn release(&self, conn: Connection) {
        // A connection still inside a transaction is never handed out again.
        if !conn.is_autocommit() {
            tracing::warn!("discarding connection left inside a transaction");
            return;
        }
        let mut idle = self.lock_idle();
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(conn);
        }
    }
}

/// A connection borrowed from the store's pool.
struct PooledConnection<'a> {
    store: &'a SqliteLotStore,
    // Only taken in Drop.
    conn: Option<Connection>,
}

impl std::ops::Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("pooled connection is present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.store.release(conn);
        }
    }
}

/// Write transaction on a pooled connection.
pub struct SqliteTxn<'a> {
    conn: PooledConnection<'a>,
    finished: bool,
}

impl Drop for SqliteTxn<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %err, "rollback failed");
            }
        }
    }
}

impl StoreTxn for SqliteTxn<'_> {
    fn get_lot(&mut self, id: LotId) -> Result<Option<Lot>> {
        select_lot(&self.conn, id)
    }

    fn lot_ids_for_item(&mut self, item: &str) -> Result<Vec<LotId>> {
        select_lot_ids_for_item(&self.conn, item)
    }

    fn lots_for_item(&mut self, item: &str) -> Result<Vec<Lot>> {
        select_lots_for_item(&self.conn, item)
    }

    fn insert_lot(&mut self, lot: &NewLot) -> Result<Lot> {
        if lot.on_hand_qty < 0 {
            return Err(LedgerError::InvariantViolation(format!(
                "new lot for {} with negative quantity {}",
                lot.item, lot.on_hand_qty
            )));
        }

        let metadata_json = if lot.metadata.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&lot.metadata)?)
        };
        let created_at = lot.created_at.to_rfc3339();

        self.conn.execute(
            r#"
            INSERT INTO lots (
                item,
                on_hand_qty,
                staged_qty,
                location,
                metadata_json,
                created_at,
                last_modified
            )
            VALUES (?, ?, 0, ?, ?, ?, ?)
            "#,
            (
                &lot.item,
                lot.on_hand_qty,
                &lot.location,
                metadata_json,
                &created_at,
                &created_at,
            ),
        )?;
        let id = LotId(self.conn.last_insert_rowid());

        Ok(Lot {
            id,
            item: lot.item.clone(),
            on_hand_qty: lot.on_hand_qty,
            staged_qty: 0,
            location: lot.location.clone(),
            metadata: lot.metadata.clone(),
            created_at: lot.created_at,
            last_modified: lot.created_at,
        })
    }

    fn apply_delta(&mut self, id: LotId, delta: &LotDelta) -> Result<Lot> {
        let current = select_lot(&self.conn, id)?
            .ok_or_else(|| LedgerError::NotFound(format!("lot {}", id)))?;

        let on_hand = current.on_hand_qty.checked_add(delta.on_hand);
        let staged = current.staged_qty.checked_add(delta.staged);
        let (on_hand, staged) = match (on_hand, staged) {
            (Some(on_hand), Some(staged)) if on_hand >= 0 && staged >= 0 => (on_hand, staged),
            _ => {
                return Err(LedgerError::InvariantViolation(format!(
                    "lot {} cannot apply on_hand {:+} / staged {:+} to on_hand {} / staged {}",
                    id, delta.on_hand, delta.staged, current.on_hand_qty, current.staged_qty
                )));
            }
        };
        let location = delta.location.clone().or(current.location);

        self.conn.execute(
            r#"
            UPDATE lots
            SET on_hand_qty = ?, staged_qty = ?, location = ?, last_modified = ?
            WHERE lot_id = ?
            "#,
            (on_hand, staged, &location, delta.at.to_rfc3339(), id),
        )?;

        Ok(Lot {
            on_hand_qty: on_hand,
            staged_qty: staged,
            location,
            last_modified: delta.at,
            ..current
        })
    }

    fn append_entry(&mut self, entry: &NewLedgerEntry) -> Result<LedgerEntry> {
        self.conn.execute(
            r#"
            INSERT INTO ledger_entries (
                operation_id,
                operation_kind,
                lot_id,
                item,
                quantity_delta,
                location_from,
                location_to,
                actor,
                timestamp,
                work_order
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            (
                entry.operation_id.to_string(),
                entry.kind.as_str(),
                entry.lot_id,
                &entry.item,
                entry.quantity_delta,
                &entry.location_from,
                &entry.location_to,
                &entry.actor,
                entry.timestamp.to_rfc3339(),
                &entry.work_order,
            ),
        )?;
        let entry_id = self.conn.last_insert_rowid();

        Ok(LedgerEntry {
            entry_id,
            operation_id: entry.operation_id,
            kind: entry.kind,
            lot_id: entry.lot_id,
            item: entry.item.clone(),
            quantity_delta: entry.quantity_delta,
            location_from: entry.location_from.clone(),
            location_to: entry.location_to.clone(),
            actor: entry.actor.clone(),
            timestamp: entry.timestamp,
            work_order: entry.work_order.clone(),
        })
    }

    fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl LotStore for SqliteLotStore {
    type Txn<'a> = SqliteTxn<'a>;

    fn begin(&self) -> Result<Self::Txn<'_>> {
        let conn = self.checkout()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(SqliteTxn {
            conn,
            finished: false,
        })
    }

    fn get_lot(&self, id: LotId) -> Result<Option<Lot>> {
        let conn = self.checkout()?;
        select_lot(&conn, id)
    }

    fn lot_ids_for_item(&self, item: &str) -> Result<Vec<LotId>> {
        let conn = self.checkout()?;
        select_lot_ids_for_item(&conn, item)
    }

    fn lots_for_item(&self, item: &str) -> Result<Vec<Lot>> {
        let conn = self.checkout()?;
        select_lots_for_item(&conn, item)
    }

    fn list_lots(&self) -> Result<Vec<Lot>> {
        let conn = self.checkout()?;
        select_all_lots(&conn)
    }

    fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>> {
        let conn = self.checkout()?;
        select_entries(&conn, filter)
    }

    fn snapshot(&self) -> Result<StoreSnapshot> {
        let conn = self.checkout()?;
        // A deferred read transaction pins one WAL snapshot for both reads.
        let tx = conn.unchecked_transaction()?;
        let lots = select_all_lots(&tx)?;
        let entries = select_entries(&tx, &EntryFilter::new())?;
        tx.commit()?;
        Ok(StoreSnapshot { lots, entries })
    }

    fn check_integrity(&self) -> Result<()> {
        let conn = self.checkout()?;

        let verdict: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if verdict != "ok" {
            return Err(LedgerError::Storage(format!(
                "Integrity check failed: {}",
                verdict
            )));
        }

        let dangling: Option<String> = conn
            .query_row("PRAGMA foreign_key_check", [], |row| row.get(0))
            .optional()?;
        if let Some(table) = dangling {
            return Err(LedgerError::Storage(format!(
                "Foreign key violation in table {}",
                table
            )));
        }

        for key in REQUIRED_META_KEYS {
            let present: Option<String> = conn
                .query_row("SELECT value FROM meta WHERE key = ?", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            if present.is_none() {
                return Err(LedgerError::Storage(format!(
                    "Missing metadata key: {}",
                    key
                )));
            }
        }

        Ok(())
    }

    fn backup_to(&self, destination: &Path) -> Result<()> {
        let temp_path = crate::fs::temp_sibling(destination)?;
        let conn = self.checkout()?;
        conn.execute("VACUUM INTO ?", [temp_path.to_string_lossy().as_ref()])
            .map_err(|e| LedgerError::Storage(format!("Snapshot failed: {}", e)))?;
        crate::fs::rename_with_fallback(&temp_path, destination)
            .map_err(|e| LedgerError::Storage(format!("Atomic rename failed: {}", e)))?;
        Ok(())
    }
}

fn select_lot(conn: &Connection, id: LotId) -> Result<Option<Lot>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM lots WHERE lot_id = ?", LOT_COLUMNS),
            [id],
            LotRow::from_row,
        )
        .optional()?;
    row.map(Lot::try_from).transpose()
}

fn select_lot_ids_for_item(conn: &Connection, item: &str) -> Result<Vec<LotId>> {
    let mut stmt = conn.prepare("SELECT lot_id FROM lots WHERE item = ? ORDER BY lot_id ASC")?;
    let rows = stmt.query_map([item], |row| row.get::<_, LotId>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

fn select_lots_for_item(conn: &Connection, item: &str) -> Result<Vec<Lot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM lots WHERE item = ? ORDER BY lot_id ASC",
        LOT_COLUMNS
    ))?;
    let rows = stmt.query_map([item], LotRow::from_row)?;
    collect_lots(rows)
}

fn select_all_lots(conn: &Connection) -> Result<Vec<Lot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM lots ORDER BY lot_id ASC",
        LOT_COLUMNS
    ))?;
    let rows = stmt.query_map([], LotRow::from_row)?;
    collect_lots(rows)
}

fn select_entries(conn: &Connection, filter: &EntryFilter) -> Result<Vec<LedgerEntry>> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(lot_id) = filter.lot_id {
        conditions.push("lot_id = ?");
        params.push(Box::new(lot_id));
    }

    if let Some(ref item) = filter.item {
        conditions.push("item = ?");
        params.push(Box::new(item.clone()));
    }

    if let Some(kind) = filter.kind {
        conditions.push("operation_kind = ?");
        params.push(Box::new(kind.as_str()));
    }

    if let Some(ref work_order) = filter.work_order {
        conditions.push("work_order = ?");
        params.push(Box::new(work_order.clone()));
    }

    if let Some(operation_id) = filter.operation_id {
        conditions.push("operation_id = ?");
        params.push(Box::new(operation_id.to_string()));
    }

    let mut query = format!("SELECT {} FROM ledger_entries", ENTRY_COLUMNS);
    if !conditions.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&conditions.join(" AND "));
    }
    if filter.newest_first {
        query.push_str(" ORDER BY entry_id DESC");
    } else {
        query.push_str(" ORDER BY entry_id ASC");
    }

    if let Some(limit) = filter.limit {
        query.push_str(" LIMIT ?");
        params.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(params.iter()),
        EntryRow::from_row,
    )?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.try_into()?);
    }
    Ok(entries)
}

fn collect_lots<I>(rows: I) -> Result<Vec<Lot>>
where
    I: Iterator<Item = rusqlite::Result<LotRow>>,
{
    let mut lots = Vec::new();
    for row in rows {
        lots.push(row?.try_into()?);
    }
    Ok(lots)
}

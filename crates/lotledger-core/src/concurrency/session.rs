//! Operation state tracking and the locked transaction session.

use std::fmt;

use uuid::Uuid;

use super::locks::LockGuard;
use crate::error::{LedgerError, Result};
use crate::storage::{LedgerEntry, Lot, LotDelta, LotId, NewLedgerEntry, NewLot, OperationKind, StoreTxn};

/// Lifecycle of one operation.
///
/// `Validating → Locking → Computing → Applying → Logging → Committed`, or
/// `Aborted` from any state before `Committed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OperationState {
    Validating,
    Locking,
    Computing,
    Applying,
    Logging,
    Committed,
    Aborted,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationState::Committed | OperationState::Aborted)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationState::Validating => "validating",
            OperationState::Locking => "locking",
            OperationState::Computing => "computing",
            OperationState::Applying => "applying",
            OperationState::Logging => "logging",
            OperationState::Committed => "committed",
            OperationState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Forward-only state tracker for one operation.
///
/// Dropping a trace that never reached `Committed` records the abort.
#[derive(Debug)]
pub struct OperationTrace {
    operation_id: Uuid,
    kind: OperationKind,
    state: OperationState,
}

impl OperationTrace {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            kind,
            state: OperationState::Validating,
        }
    }

    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Move forward to `next`. Staying in the current state is a no-op.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` on a backwards move, a move out of a terminal
    /// state, or a commit that did not pass through `Logging`.
    pub fn advance(&mut self, next: OperationState) -> Result<()> {
        if next == self.state {
            return Ok(());
        }
        let allowed = !self.state.is_terminal()
            && next > self.state
            && next != OperationState::Aborted
            && (next != OperationState::Committed || self.state == OperationState::Logging);
        if !allowed {
            return Err(LedgerError::InvariantViolation(format!(
                "operation {} cannot move from {} to {}",
                self.operation_id, self.state, next
            )));
        }
        tracing::debug!(
            operation_id = %self.operation_id,
            kind = %self.kind,
            from = %self.state,
            to = %next,
            "operation state"
        );
        self.state = next;
        Ok(())
    }

    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            tracing::debug!(
                operation_id = %self.operation_id,
                kind = %self.kind,
                from = %self.state,
                "operation aborted"
            );
            self.state = OperationState::Aborted;
        }
    }
}

impl Drop for OperationTrace {
    fn drop(&mut self) {
        self.abort();
    }
}

/// An open transaction whose lot set is locked.
///
/// Every write goes through here, and every lot read or written must be
/// covered by the held locks or created by this session.
pub struct Session<'l, T: StoreTxn> {
    // Declared first so the transaction rolls back before the locks release.
    txn: T,
    locks: LockGuard<'l>,
    created: Vec<LotId>,
    trace: OperationTrace,
}

impl<'l, T: StoreTxn> Session<'l, T> {
    pub(crate) fn new(txn: T, locks: LockGuard<'l>, trace: OperationTrace) -> Self {
        Self {
            txn,
            locks,
            created: Vec::new(),
            trace,
        }
    }

    pub fn operation_id(&self) -> Uuid {
        self.trace.operation_id()
    }

    pub fn kind(&self) -> OperationKind {
        self.trace.kind()
    }

    pub fn state(&self) -> OperationState {
        self.trace.state()
    }

    pub(crate) fn advance(&mut self, next: OperationState) -> Result<()> {
        self.trace.advance(next)
    }

    /// Read a locked lot.
    pub fn lot(&mut self, id: LotId) -> Result<Option<Lot>> {
        self.ensure_covered(id)?;
        self.txn.get_lot(id)
    }

    /// Read every lot of `item`, ascending, all of which must be locked.
    pub fn candidates(&mut self, item: &str) -> Result<Vec<Lot>> {
        let lots = self.txn.lots_for_item(item)?;
        for lot in &lots {
            self.ensure_covered(lot.id)?;
        }
        Ok(lots)
    }

    /// Create a lot. It is invisible to other operations until commit.
    pub fn create_lot(&mut self, lot: &NewLot) -> Result<Lot> {
        self.advance(OperationState::Applying)?;
        let created = self.txn.insert_lot(lot)?;
        self.created.push(created.id);
        Ok(created)
    }

    pub fn apply_delta(&mut self, id: LotId, delta: &LotDelta) -> Result<Lot> {
        self.ensure_covered(id)?;
        self.advance(OperationState::Applying)?;
        self.txn.apply_delta(id, delta)
    }

    pub fn append(&mut self, entry: &NewLedgerEntry) -> Result<LedgerEntry> {
        if entry.operation_id != self.operation_id() || entry.kind != self.kind() {
            return Err(LedgerError::InvariantViolation(format!(
                "entry for {} {} appended to operation {} {}",
                entry.kind,
                entry.operation_id,
                self.kind(),
                self.operation_id()
            )));
        }
        self.ensure_covered(entry.lot_id)?;
        self.advance(OperationState::Logging)?;
        self.txn.append_entry(entry)
    }

    pub(crate) fn commit(mut self) -> Result<()> {
        self.trace.advance(OperationState::Committed)?;
        // On failure the transaction handle was consumed; the backend
        // rolls back on its own drop.
        if let Err(err) = self.txn.commit() {
            self.trace.state = OperationState::Aborted;
            return Err(err);
        }
        Ok(())
    }

    fn ensure_covered(&self, id: LotId) -> Result<()> {
        if self.locks.covers(id) || self.created.contains(&id) {
            return Ok(());
        }
        Err(LedgerError::InvariantViolation(format!(
            "lot {} touched without holding its lock",
            id
        )))
    }
}

//! The ledger engine.
//!
//! `Ledger` owns a [`LotStore`], a [`Clock`] and the concurrency controller.
//! Every mutating operation follows the same path: validate the request,
//! lock the lots it may touch, compute against the locked state, apply the
//! deltas, append the ledger entries and commit. Any failure along the way
//! rolls the whole operation back.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Span;
use uuid::Uuid;

use crate::allocation::{allocate_fifo, select_restock_lot};
use crate::audit::{self, ReconcileReport};
use crate::clock::{Clock, SystemClock};
use crate::concurrency::{Controller, LockScope, OperationTrace, RetryPolicy, Session};
use crate::config::EngineConfig;
use crate::error::{LedgerError, Result};
use crate::request::{AdjustRequest, PickRequest, RestockRequest, RestockTarget, StockRequest};
use crate::storage::{
    EntryFilter, LedgerEntry, Lot, LotDelta, LotId, LotStore, NewLedgerEntry, NewLot,
    OperationKind, SqliteLotStore, StoreTxn,
};
use crate::validation::{validate_adjust, validate_pick, validate_restock, validate_stock};

/// Result of a committed operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub item: String,

    /// Quantity requested; the signed delta for ADJUST
    pub quantity: i64,

    /// Every lot the operation changed, ascending by id
    pub lots: Vec<LotChange>,

    /// Ledger entries written, one per changed lot
    pub entries: Vec<LedgerEntry>,
}

impl OperationOutcome {
    /// The last lot changed. For single-lot operations, the only one.
    pub fn lot_id(&self) -> Option<LotId> {
        self.lots.last().map(|change| change.lot_id)
    }

    pub fn new_on_hand(&self) -> Option<i64> {
        self.lots.last().map(|change| change.on_hand_qty)
    }

    pub fn new_staged(&self) -> Option<i64> {
        self.lots.last().map(|change| change.staged_qty)
    }
}

/// A lot's state after an operation changed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotChange {
    pub lot_id: LotId,

    /// Quantity this lot contributed to the operation
    pub quantity: i64,

    pub on_hand_qty: i64,
    pub staged_qty: i64,
    pub location: Option<String>,

    /// True when the operation created the lot
    pub created: bool,
}

impl LotChange {
    fn new(lot: &Lot, quantity: i64, created: bool) -> Self {
        Self {
            lot_id: lot.id,
            quantity,
            on_hand_qty: lot.on_hand_qty,
            staged_qty: lot.staged_qty,
            location: lot.location.clone(),
            created,
        }
    }
}

/// Totals across every lot of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    pub item: String,
    pub lot_count: usize,
    pub on_hand_qty: i64,
    pub staged_qty: i64,
}

/// Fields shared by every entry one operation writes.
struct EntryContext<'r> {
    operation_id: Uuid,
    kind: OperationKind,
    actor: &'r str,
    work_order: Option<&'r str>,
    at: DateTime<Utc>,
}

impl<'r> EntryContext<'r> {
    fn new<T: StoreTxn>(
        session: &Session<'_, T>,
        actor: &'r str,
        work_order: Option<&'r str>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            operation_id: session.operation_id(),
            kind: session.kind(),
            actor,
            work_order,
            at,
        }
    }

    fn entry(
        &self,
        lot: &Lot,
        quantity_delta: i64,
        location_from: Option<String>,
        location_to: Option<String>,
    ) -> NewLedgerEntry {
        NewLedgerEntry {
            operation_id: self.operation_id,
            kind: self.kind,
            lot_id: lot.id,
            item: lot.item.clone(),
            quantity_delta,
            location_from,
            location_to,
            actor: self.actor.to_string(),
            timestamp: self.at,
            work_order: self.work_order.map(str::to_string),
        }
    }
}

/// Inventory ledger over a lot store.
///
/// `Ledger` is `Send + Sync`; share it between threads by reference or
/// `Arc`. Operations on disjoint lots proceed independently.
pub struct Ledger<S: LotStore = SqliteLotStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    controller: Controller,
    config: EngineConfig,
}

impl Ledger<SqliteLotStore, SystemClock> {
    /// Open (creating if needed) a SQLite-backed ledger at `path`.
    pub fn open(path: &Path, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = SqliteLotStore::open(path, config.concurrency.lock_timeout())?;
        Ok(Self::with_parts(store, SystemClock, config))
    }
}

impl<S: LotStore, C: Clock> Ledger<S, C> {
    pub fn with_parts(store: S, clock: C, config: EngineConfig) -> Self {
        let controller = Controller::new(&config.concurrency);
        Self {
            store,
            clock,
            controller,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Retry policy built from the configured concurrency settings, for use
    /// with [`crate::with_retry`].
    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.concurrency.retry_policy()
    }

    /// Receive stock into an existing lot or a new one.
    ///
    /// When `request.lot_id` names a lot that does not exist, a new lot is
    /// created with the next identifier from the store's sequence; the
    /// requested identifier is not reused.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed request or a lot holding another item.
    pub fn stock(&self, request: &StockRequest) -> Result<OperationOutcome> {
        let trace = OperationTrace::new(OperationKind::Stock);
        let span = operation_span(&trace, &request.item);
        let _entered = span.enter();

        let result = validate_stock(request, &self.config.limits).and_then(|()| {
            let scope = match request.lot_id {
                Some(id) => LockScope::Lot(id),
                None => LockScope::Fresh,
            };
            self.controller.run(&self.store, trace, scope, |session| {
                self.stock_locked(session, request)
            })
        });
        finish(result)
    }

    fn stock_locked<T: StoreTxn>(
        &self,
        session: &mut Session<'_, T>,
        request: &StockRequest,
    ) -> Result<OperationOutcome> {
        let now = self.clock.now();
        let existing = match request.lot_id {
            Some(id) => session.lot(id)?,
            None => None,
        };

        let (lot, created) = match existing {
            Some(lot) => {
                ensure_item(&lot, &request.item)?;
                let delta = LotDelta::new(request.quantity, 0, now)
                    .with_location(Some(request.location.clone()));
                (session.apply_delta(lot.id, &delta)?, false)
            }
            None => {
                if let Some(requested) = request.lot_id {
                    tracing::debug!(%requested, "lot does not exist, creating a new one");
                }
                let new_lot = NewLot {
                    item: request.item.clone(),
                    on_hand_qty: request.quantity,
                    location: Some(request.location.clone()),
                    metadata: request.metadata.clone(),
                    created_at: now,
                };
                (session.create_lot(&new_lot)?, true)
            }
        };

        let context = EntryContext::new(session, &request.actor, request.work_order.as_deref(), now);
        let entry = session.append(&context.entry(
            &lot,
            request.quantity,
            None,
            lot.location.clone(),
        ))?;

        Ok(OperationOutcome {
            operation_id: session.operation_id(),
            kind: OperationKind::Stock,
            item: request.item.clone(),
            quantity: request.quantity,
            lots: vec![LotChange::new(&lot, request.quantity, created)],
            entries: vec![entry],
        })
    }

    /// Move stock from on-hand to staged, from one lot or FIFO across every
    /// lot of the item.
    ///
    /// # Errors
    ///
    /// `NotFound` when the lot (or every lot of the item) is missing;
    /// `InsufficientQuantity` when on-hand cannot cover the request, in which
    /// case nothing changes.
    pub fn pick(&self, request: &PickRequest) -> Result<OperationOutcome> {
        let trace = OperationTrace::new(OperationKind::Pick);
        let span = operation_span(&trace, &request.item);
        let _entered = span.enter();

        let result = validate_pick(request, &self.config.limits).and_then(|()| {
            let scope = match request.lot_id {
                Some(id) => LockScope::Lot(id),
                None => LockScope::Item(&request.item),
            };
            self.controller.run(&self.store, trace, scope, |session| {
                self.pick_locked(session, request)
            })
        });
        finish(result)
    }

    fn pick_locked<T: StoreTxn>(
        &self,
        session: &mut Session<'_, T>,
        request: &PickRequest,
    ) -> Result<OperationOutcome> {
        let now = self.clock.now();
        let candidates = match request.lot_id {
            Some(id) => {
                let lot = session
                    .lot(id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("lot {}", id)))?;
                ensure_item(&lot, &request.item)?;
                vec![lot]
            }
            None => {
                let lots = session.candidates(&request.item)?;
                if lots.is_empty() {
                    return Err(LedgerError::NotFound(format!(
                        "no lots for item {}",
                        request.item
                    )));
                }
                lots
            }
        };

        // Shortfall fails here, before any lot is touched.
        let portions = allocate_fifo(&candidates, request.quantity)?;

        let mut changed = Vec::with_capacity(portions.len());
        for portion in &portions {
            let delta = LotDelta::new(-portion.quantity, portion.quantity, now);
            let lot = session.apply_delta(portion.lot_id, &delta)?;
            changed.push((lot, portion.quantity));
        }

        let context = EntryContext::new(session, &request.actor, request.work_order.as_deref(), now);
        let mut entries = Vec::with_capacity(changed.len());
        for (lot, quantity) in &changed {
            entries.push(session.append(&context.entry(
                lot,
                *quantity,
                lot.location.clone(),
                request.destination.clone(),
            ))?);
        }

        tracing::debug!(lots = changed.len(), "pick allocated");
        Ok(OperationOutcome {
            operation_id: session.operation_id(),
            kind: OperationKind::Pick,
            item: request.item.clone(),
            quantity: request.quantity,
            lots: changed
                .iter()
                .map(|(lot, quantity)| LotChange::new(lot, *quantity, false))
                .collect(),
            entries,
        })
    }

    /// Return staged stock to on-hand.
    ///
    /// An item target restocks the oldest lot whose staged quantity covers
    /// the request. The staged quantity is never clamped.
    ///
    /// # Errors
    ///
    /// `InsufficientStagedQuantity` when staged cannot cover the request.
    pub fn restock(&self, request: &RestockRequest) -> Result<OperationOutcome> {
        let trace = OperationTrace::new(OperationKind::Restock);
        let label = match &request.target {
            RestockTarget::Lot(id) => format!("lot {}", id),
            RestockTarget::Item(item) => item.clone(),
        };
        let span = operation_span(&trace, &label);
        let _entered = span.enter();

        let result = validate_restock(request, &self.config.limits).and_then(|()| {
            let scope = match &request.target {
                RestockTarget::Lot(id) => LockScope::Lot(*id),
                RestockTarget::Item(item) => LockScope::Item(item),
            };
            self.controller.run(&self.store, trace, scope, |session| {
                self.restock_locked(session, request)
            })
        });
        finish(result)
    }

    fn restock_locked<T: StoreTxn>(
        &self,
        session: &mut Session<'_, T>,
        request: &RestockRequest,
    ) -> Result<OperationOutcome> {
        let now = self.clock.now();
        let lot = match &request.target {
            RestockTarget::Lot(id) => session
                .lot(*id)?
                .ok_or_else(|| LedgerError::NotFound(format!("lot {}", id)))?,
            RestockTarget::Item(item) => {
                let lots = session.candidates(item)?;
                select_restock_lot(&lots, item, request.quantity)?.clone()
            }
        };

        if lot.staged_qty < request.quantity {
            return Err(LedgerError::InsufficientStagedQuantity {
                available: lot.staged_qty,
                requested: request.quantity,
            });
        }

        let delta = LotDelta::new(request.quantity, -request.quantity, now)
            .with_location(request.location.clone());
        let updated = session.apply_delta(lot.id, &delta)?;

        let context = EntryContext::new(session, &request.actor, request.work_order.as_deref(), now);
        let entry = session.append(&context.entry(
            &updated,
            request.quantity,
            None,
            updated.location.clone(),
        ))?;

        Ok(OperationOutcome {
            operation_id: session.operation_id(),
            kind: OperationKind::Restock,
            item: updated.item.clone(),
            quantity: request.quantity,
            lots: vec![LotChange::new(&updated, request.quantity, false)],
            entries: vec![entry],
        })
    }

    /// Correct a lot's on-hand quantity after a physical count.
    ///
    /// # Errors
    ///
    /// `InsufficientQuantity` when a negative delta exceeds on-hand.
    pub fn adjust(&self, request: &AdjustRequest) -> Result<OperationOutcome> {
        let trace = OperationTrace::new(OperationKind::Adjust);
        let span = operation_span(&trace, &format!("lot {}", request.lot_id));
        let _entered = span.enter();

        let result = validate_adjust(request, &self.config.limits).and_then(|()| {
            let scope = LockScope::Lot(request.lot_id);
            self.controller.run(&self.store, trace, scope, |session| {
                self.adjust_locked(session, request)
            })
        });
        finish(result)
    }

    fn adjust_locked<T: StoreTxn>(
        &self,
        session: &mut Session<'_, T>,
        request: &AdjustRequest,
    ) -> Result<OperationOutcome> {
        let now = self.clock.now();
        let lot = session
            .lot(request.lot_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("lot {}", request.lot_id)))?;

        if lot.on_hand_qty + request.delta < 0 {
            return Err(LedgerError::InsufficientQuantity {
                available: lot.on_hand_qty,
                requested: -request.delta,
            });
        }

        let updated = session.apply_delta(lot.id, &LotDelta::new(request.delta, 0, now))?;

        let context = EntryContext::new(session, &request.actor, request.work_order.as_deref(), now);
        let entry = session.append(&context.entry(
            &updated,
            request.delta,
            None,
            updated.location.clone(),
        ))?;

        Ok(OperationOutcome {
            operation_id: session.operation_id(),
            kind: OperationKind::Adjust,
            item: updated.item.clone(),
            quantity: request.delta,
            lots: vec![LotChange::new(&updated, request.delta, false)],
            entries: vec![entry],
        })
    }

    /// Get a lot by identifier.
    pub fn lot(&self, id: LotId) -> Result<Lot> {
        self.store
            .get_lot(id)?
            .ok_or_else(|| LedgerError::NotFound(format!("lot {}", id)))
    }

    /// Every lot of `item`, oldest first.
    pub fn lots_for_item(&self, item: &str) -> Result<Vec<Lot>> {
        self.store.lots_for_item(item)
    }

    pub fn list_lots(&self) -> Result<Vec<Lot>> {
        self.store.list_lots()
    }

    /// Totals across every lot of `item`.
    pub fn item_summary(&self, item: &str) -> Result<ItemSummary> {
        let lots = self.store.lots_for_item(item)?;
        if lots.is_empty() {
            return Err(LedgerError::NotFound(format!("no lots for item {}", item)));
        }
        Ok(ItemSummary {
            item: item.to_string(),
            lot_count: lots.len(),
            on_hand_qty: lots.iter().map(|lot| lot.on_hand_qty).sum(),
            staged_qty: lots.iter().map(|lot| lot.staged_qty).sum(),
        })
    }

    pub fn history(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>> {
        self.store.list_entries(filter)
    }

    /// Replay the transaction log and compare it with stored quantities.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let snapshot = self.store.snapshot()?;
        let report = audit::reconcile(&snapshot.lots, &snapshot.entries);
        if !report.is_clean() {
            tracing::error!(
                discrepancies = report.discrepancies.len(),
                "ledger does not reconcile with stored quantities"
            );
        }
        Ok(report)
    }

    /// Backend integrity checks followed by reconciliation.
    pub fn check(&self) -> Result<ReconcileReport> {
        self.store.check_integrity()?;
        self.reconcile()
    }

    /// Write a consistent copy of the store to `destination`.
    pub fn backup_to(&self, destination: &Path) -> Result<()> {
        self.store.backup_to(destination)?;
        tracing::info!(destination = %destination.display(), "backup written");
        Ok(())
    }
}

fn operation_span(trace: &OperationTrace, subject: &str) -> Span {
    tracing::info_span!(
        "operation",
        kind = %trace.kind(),
        operation_id = %trace.operation_id(),
        subject = %subject
    )
}

fn ensure_item(lot: &Lot, item: &str) -> Result<()> {
    if lot.item != item {
        return Err(LedgerError::Validation(format!(
            "lot {} holds {}, not {}",
            lot.id, lot.item, item
        )));
    }
    Ok(())
}

/// Log the outcome at the level its class calls for.
fn finish(result: Result<OperationOutcome>) -> Result<OperationOutcome> {
    match &result {
        Ok(outcome) => tracing::info!(
            lots = outcome.lots.len(),
            quantity = outcome.quantity,
            "committed"
        ),
        Err(err) if matches!(err, LedgerError::InvariantViolation(_)) => {
            tracing::error!(error = %err, "aborted on invariant violation")
        }
        Err(err) if err.is_retryable() => tracing::warn!(error = %err, "aborted, retryable"),
        Err(err) => tracing::info!(error = %err, "rejected"),
    }
    result
}

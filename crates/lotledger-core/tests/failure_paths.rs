use std::path::Path;
use std::sync::{mpsc, Mutex};
use std::thread;
use std::time::Duration;

use lotledger_core::storage::{
    LotDelta, NewLedgerEntry, NewLot, SqliteLotStore, SqliteTxn, StoreSnapshot, StoreTxn,
};
use lotledger_core::{
    AdjustRequest, ConcurrencySettings, EngineConfig, EntryFilter, Ledger, LedgerEntry,
    LedgerError, Lot, LotId, LotStore, PickRequest, Result, StockRequest, SystemClock,
};
use tempfile::TempDir;

/// Failure injected into write transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    None,
    /// The nth `apply_delta` of a transaction fails
    FailApply(usize),
    /// The nth `append_entry` of a transaction fails
    FailAppend(usize),
    /// Lock-set discovery never sees the item's lots
    StaleDiscovery,
    /// `apply_delta` signals, then stalls with every lock held
    HoldApply(Duration),
}

/// SQLite store with switchable faults.
struct FaultyStore {
    inner: SqliteLotStore,
    fault: Mutex<Fault>,
    applying: Mutex<Option<mpsc::Sender<()>>>,
}

impl FaultyStore {
    fn set_fault(&self, fault: Fault) {
        *self.fault.lock().unwrap() = fault;
    }

    fn fault(&self) -> Fault {
        *self.fault.lock().unwrap()
    }

    fn notify_on_apply(&self) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel();
        *self.applying.lock().unwrap() = Some(tx);
        rx
    }
}

struct FaultyTxn<'a> {
    inner: SqliteTxn<'a>,
    store: &'a FaultyStore,
    fault: Fault,
    applies: usize,
    appends: usize,
}

fn injected(what: &str) -> LedgerError {
    LedgerError::Storage(format!("injected {} failure", what))
}

impl StoreTxn for FaultyTxn<'_> {
    fn get_lot(&mut self, id: LotId) -> Result<Option<Lot>> {
        self.inner.get_lot(id)
    }

    fn lot_ids_for_item(&mut self, item: &str) -> Result<Vec<LotId>> {
        self.inner.lot_ids_for_item(item)
    }

    fn lots_for_item(&mut self, item: &str) -> Result<Vec<Lot>> {
        self.inner.lots_for_item(item)
    }

    fn insert_lot(&mut self, lot: &NewLot) -> Result<Lot> {
        self.inner.insert_lot(lot)
    }

    fn apply_delta(&mut self, id: LotId, delta: &LotDelta) -> Result<Lot> {
        self.applies += 1;
        match self.fault {
            Fault::FailApply(n) if n == self.applies => return Err(injected("apply")),
            Fault::HoldApply(pause) => {
                if let Some(tx) = self.store.applying.lock().unwrap().take() {
                    let _ = tx.send(());
                }
                thread::sleep(pause);
            }
            _ => {}
        }
        self.inner.apply_delta(id, delta)
    }

    fn append_entry(&mut self, entry: &NewLedgerEntry) -> Result<LedgerEntry> {
        self.appends += 1;
        if self.fault == Fault::FailAppend(self.appends) {
            return Err(injected("append"));
        }
        self.inner.append_entry(entry)
    }

    fn commit(self) -> Result<()> {
        self.inner.commit()
    }
}

impl LotStore for FaultyStore {
    type Txn<'a> = FaultyTxn<'a>;

    fn begin(&self) -> Result<Self::Txn<'_>> {
        Ok(FaultyTxn {
            inner: self.inner.begin()?,
            store: self,
            fault: self.fault(),
            applies: 0,
            appends: 0,
        })
    }

    fn get_lot(&self, id: LotId) -> Result<Option<Lot>> {
        self.inner.get_lot(id)
    }

    fn lot_ids_for_item(&self, item: &str) -> Result<Vec<LotId>> {
        if self.fault() == Fault::StaleDiscovery {
            return Ok(Vec::new());
        }
        self.inner.lot_ids_for_item(item)
    }

    fn lots_for_item(&self, item: &str) -> Result<Vec<Lot>> {
        self.inner.lots_for_item(item)
    }

    fn list_lots(&self) -> Result<Vec<Lot>> {
        self.inner.list_lots()
    }

    fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>> {
        self.inner.list_entries(filter)
    }

    fn snapshot(&self) -> Result<StoreSnapshot> {
        self.inner.snapshot()
    }

    fn check_integrity(&self) -> Result<()> {
        self.inner.check_integrity()
    }

    fn backup_to(&self, destination: &Path) -> Result<()> {
        self.inner.backup_to(destination)
    }
}

fn config(lock_timeout_ms: u64) -> EngineConfig {
    EngineConfig {
        concurrency: ConcurrencySettings {
            lock_timeout_ms,
            relock_attempts: 3,
            ..ConcurrencySettings::default()
        },
        ..EngineConfig::default()
    }
}

fn open_faulty(dir: &TempDir, lock_timeout_ms: u64) -> Ledger<FaultyStore> {
    let config = config(lock_timeout_ms);
    let inner = SqliteLotStore::open(&dir.path().join("ledger.db"), config.concurrency.lock_timeout())
        .expect("open should succeed");
    let store = FaultyStore {
        inner,
        fault: Mutex::new(Fault::None),
        applying: Mutex::new(None),
    };
    Ledger::with_parts(store, SystemClock, config)
}

fn stock<S: LotStore>(ledger: &Ledger<S>, item: &str, quantity: i64) -> LotId {
    ledger
        .stock(&StockRequest::new(item, quantity, "A-01", "receiving"))
        .expect("stock should succeed")
        .lot_id()
        .expect("stock changes one lot")
}

fn quantities<S: LotStore>(ledger: &Ledger<S>, ids: &[LotId]) -> Vec<(i64, i64)> {
    ids.iter()
        .map(|id| {
            let lot = ledger.lot(*id).expect("lot exists");
            (lot.on_hand_qty, lot.staged_qty)
        })
        .collect()
}

#[test]
fn test_failure_after_partial_apply_rolls_back_everything() {
    let dir = TempDir::new().unwrap();
    let ledger = open_faulty(&dir, 2_000);
    let ids = [stock(&ledger, "C-1UF", 30), stock(&ledger, "C-1UF", 80)];
    let entries_before = ledger.history(&EntryFilter::new()).unwrap().len();

    for fault in [Fault::FailApply(2), Fault::FailAppend(1), Fault::FailAppend(2)] {
        ledger.store().set_fault(fault);
        let err = ledger
            .pick(&PickRequest::new("C-1UF", 50, "picker"))
            .unwrap_err();
        assert!(
            matches!(err, LedgerError::Storage(ref message) if message.starts_with("injected")),
            "{:?}: unexpected {:?}",
            fault,
            err
        );

        assert_eq!(quantities(&ledger, &ids), vec![(30, 0), (80, 0)], "{:?}", fault);
        assert_eq!(
            ledger.history(&EntryFilter::new()).unwrap().len(),
            entries_before,
            "{:?}",
            fault
        );
    }

    // The rolled-back connections went back to the pool in a usable state.
    ledger.store().set_fault(Fault::None);
    let outcome = ledger
        .pick(&PickRequest::new("C-1UF", 50, "picker"))
        .unwrap();
    assert_eq!(outcome.lots.len(), 2);
    assert_eq!(quantities(&ledger, &ids), vec![(0, 30), (60, 20)]);
    assert!(ledger.check().unwrap().is_clean());
}

#[test]
fn test_lot_lock_wait_times_out_as_retryable() {
    let dir = TempDir::new().unwrap();
    let ledger = open_faulty(&dir, 100);
    let lot = stock(&ledger, "U-OPAMP", 10);

    ledger
        .store()
        .set_fault(Fault::HoldApply(Duration::from_millis(1_500)));
    let applying = ledger.store().notify_on_apply();

    thread::scope(|scope| {
        let counter = scope.spawn(|| ledger.adjust(&AdjustRequest::new(lot, -1, "counter")));

        applying.recv().expect("adjust reached apply");
        let err = ledger
            .pick(&PickRequest::new("U-OPAMP", 1, "picker").with_lot(lot))
            .unwrap_err();
        assert!(err.is_retryable(), "unexpected {:?}", err);
        assert!(err.to_string().contains("waiting for lot"), "{}", err);

        counter
            .join()
            .expect("counter thread panicked")
            .expect("adjust should commit once released");
    });

    ledger.store().set_fault(Fault::None);
    assert_eq!(quantities(&ledger, &[lot]), vec![(9, 0)]);
}

#[test]
fn test_candidate_set_that_keeps_changing_is_retryable() {
    let dir = TempDir::new().unwrap();
    let ledger = open_faulty(&dir, 2_000);
    let lot = stock(&ledger, "R-47K", 25);

    ledger.store().set_fault(Fault::StaleDiscovery);
    let err = ledger
        .pick(&PickRequest::new("R-47K", 5, "picker"))
        .unwrap_err();
    assert!(err.is_retryable(), "unexpected {:?}", err);
    assert!(err.to_string().contains("kept changing"), "{}", err);
    assert_eq!(quantities(&ledger, &[lot]), vec![(25, 0)]);

    ledger.store().set_fault(Fault::None);
    ledger
        .pick(&PickRequest::new("R-47K", 5, "picker"))
        .unwrap();
    assert_eq!(quantities(&ledger, &[lot]), vec![(20, 5)]);
}

#[test]
fn test_disjoint_lot_waits_on_database_write_lock() {
    let dir = TempDir::new().unwrap();
    let ledger = Ledger::open(&dir.path().join("ledger.db"), config(200)).unwrap();
    let first = stock(&ledger, "A-PART", 10);
    let second = stock(&ledger, "B-PART", 10);

    // Another writer holds the database while touching only the first lot.
    let mut writer = ledger.store().begin().unwrap();
    writer.get_lot(first).unwrap();

    let err = ledger
        .pick(&PickRequest::new("B-PART", 1, "picker").with_lot(second))
        .unwrap_err();
    assert!(err.is_retryable(), "unexpected {:?}", err);
    assert!(err.to_string().contains("database busy"), "{}", err);
    drop(writer);

    assert_eq!(quantities(&ledger, &[second]), vec![(10, 0)]);
    ledger
        .pick(&PickRequest::new("B-PART", 1, "picker").with_lot(second))
        .unwrap();
    assert_eq!(quantities(&ledger, &[second]), vec![(9, 1)]);
}

#[test]
fn test_disjoint_lot_proceeds_once_writer_commits() {
    let dir = TempDir::new().unwrap();
    let ledger = Ledger::open(&dir.path().join("ledger.db"), config(5_000)).unwrap();
    let first = stock(&ledger, "A-PART", 10);
    let second = stock(&ledger, "B-PART", 10);

    let (held_tx, held_rx) = mpsc::channel();
    thread::scope(|scope| {
        scope.spawn(|| {
            let writer = ledger.store().begin().unwrap();
            held_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(150));
            writer.commit().unwrap();
        });

        held_rx.recv().unwrap();
        ledger
            .pick(&PickRequest::new("B-PART", 1, "picker").with_lot(second))
            .unwrap();
    });

    assert_eq!(quantities(&ledger, &[first, second]), vec![(10, 0), (9, 1)]);
}

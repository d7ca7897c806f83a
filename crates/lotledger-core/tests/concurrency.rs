use std::thread;
use std::time::Duration;

use lotledger_core::{
    with_retry, ConcurrencySettings, EngineConfig, EntryFilter, Ledger, LedgerError, LotId,
    OperationKind, PickRequest, RestockRequest, RetryPolicy, StockRequest,
};
use tempfile::TempDir;

const THREADS: usize = 128;

fn open_ledger(dir: &TempDir) -> Ledger {
    let config = EngineConfig {
        concurrency: ConcurrencySettings {
            lock_timeout_ms: 30_000,
            relock_attempts: 10,
            ..ConcurrencySettings::default()
        },
        ..EngineConfig::default()
    };
    Ledger::open(&dir.path().join("ledger.db"), config).expect("open should succeed")
}

fn patient() -> RetryPolicy {
    RetryPolicy::new(20, Duration::from_millis(5))
}

#[test]
fn test_parallel_single_unit_picks_drain_lot_exactly() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir);

    let lot_id = ledger
        .stock(&StockRequest::new("R-0R-0402", THREADS as i64, "A-01", "receiving"))
        .unwrap()
        .lot_id()
        .unwrap();

    let results: Vec<Result<_, LedgerError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|n| {
                let ledger = &ledger;
                scope.spawn(move || {
                    let request = PickRequest::new("R-0R-0402", 1, format!("picker-{}", n))
                        .with_lot(lot_id);
                    with_retry(&patient(), || ledger.pick(&request))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("picker thread panicked"))
            .collect()
    });

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), THREADS);

    let lot = ledger.lot(lot_id).unwrap();
    assert_eq!(lot.on_hand_qty, 0);
    assert_eq!(lot.staged_qty, THREADS as i64);

    let picks = ledger
        .history(&EntryFilter::new().kind(OperationKind::Pick))
        .unwrap();
    assert_eq!(picks.len(), THREADS);

    let err = ledger
        .pick(&PickRequest::new("R-0R-0402", 1, "late").with_lot(lot_id))
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientQuantity {
            available: 0,
            requested: 1
        }
    );
}

#[test]
fn test_overlapping_multi_lot_work_completes_and_reconciles() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir);

    let mut lots: Vec<LotId> = Vec::new();
    for location in ["B-01", "B-02", "B-03", "B-04"] {
        lots.push(
            ledger
                .stock(&StockRequest::new("C-100N-0402", 500, location, "receiving"))
                .unwrap()
                .lot_id()
                .unwrap(),
        );
    }
    let initial_total = 2_000;

    thread::scope(|scope| {
        for n in 0..32usize {
            let ledger = &ledger;
            let lots = &lots;
            scope.spawn(move || {
                let actor = format!("worker-{}", n);
                let policy = patient();
                for round in 0..5usize {
                    let result = match (n + round) % 4 {
                        0 => with_retry(&policy, || {
                            ledger.pick(&PickRequest::new("C-100N-0402", 7, actor.as_str()))
                        }),
                        1 => with_retry(&policy, || {
                            ledger.pick(
                                &PickRequest::new("C-100N-0402", 3, actor.as_str())
                                    .with_lot(lots[n % lots.len()]),
                            )
                        }),
                        2 => with_retry(&policy, || {
                            ledger.restock(&RestockRequest::for_item(
                                "C-100N-0402",
                                2,
                                actor.as_str(),
                            ))
                        }),
                        _ => with_retry(&policy, || {
                            ledger.stock(&StockRequest::new(
                                "C-100N-0402",
                                1,
                                "B-05",
                                actor.as_str(),
                            ))
                        }),
                    };
                    match result {
                        Ok(_) => {}
                        Err(err) if err.is_shortfall() => {}
                        Err(err) => panic!("unexpected error: {}", err),
                    }
                }
            });
        }
    });

    let stocked_after_start: i64 = ledger
        .history(&EntryFilter::new().kind(OperationKind::Stock))
        .unwrap()
        .iter()
        .skip(lots.len())
        .map(|entry| entry.quantity_delta)
        .sum();

    let all = ledger.lots_for_item("C-100N-0402").unwrap();
    assert!(all.iter().all(|lot| lot.on_hand_qty >= 0 && lot.staged_qty >= 0));
    let total: i64 = all.iter().map(|lot| lot.on_hand_qty + lot.staged_qty).sum();
    assert_eq!(total, initial_total + stocked_after_start);

    let report = ledger.check().expect("check should succeed");
    assert!(report.is_clean(), "{:?}", report.discrepancies);
}

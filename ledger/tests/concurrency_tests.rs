//! Racing callers against one shared ledger.

use std::sync::{Arc, Barrier};
use std::thread;

use bounty_ledger::{BountyLedger, LedgerError};
use bounty_nullables::{NullClock, NullStore, NullTransfer};
use bounty_types::{Amount, BountyId, Clock, FulfilmentId, Identity};

type SharedLedger = Arc<BountyLedger<NullStore, Arc<NullTransfer>, NullClock>>;

fn shared_ledger(funds: u128) -> (SharedLedger, Arc<NullTransfer>) {
    let transfer = Arc::new(NullTransfer::new().with_balance("issuer", funds));
    let ledger = Arc::new(BountyLedger::new(
        NullStore::new(),
        Arc::clone(&transfer),
        NullClock::new(100),
    ));
    (ledger, transfer)
}

#[test]
fn racing_accepts_pay_exactly_once() {
    let (ledger, transfer) = shared_ledger(1_000);
    let issuer = Identity::new("issuer");
    let deadline = ledger.clock().now().plus_secs(1_000);
    let b = ledger
        .issue(&issuer, "task", deadline, Amount::new(1_000))
        .unwrap();
    let workers = 8;
    for i in 0..workers {
        ledger
            .fulfil(&Identity::new(format!("worker-{i}")), b, "done")
            .unwrap();
    }

    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            let issuer = issuer.clone();
            thread::spawn(move || {
                barrier.wait();
                ledger.accept_fulfilment(&issuer, b, FulfilmentId::new(i as u64))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(matches!(err, LedgerError::BountyNotOpen { .. }));
    }

    let paid: Vec<_> = (0..workers)
        .map(|i| transfer.balance(&Identity::new(format!("worker-{i}"))))
        .filter(|a| !a.is_zero())
        .collect();
    assert_eq!(paid, vec![Amount::new(1_000)]);
    assert_eq!(transfer.releases().len(), 1);
}

#[test]
fn accept_races_cancel() {
    for _ in 0..20 {
        let (ledger, transfer) = shared_ledger(10);
        let issuer = Identity::new("issuer");
        let deadline = ledger.clock().now().plus_secs(1_000);
        let b = ledger.issue(&issuer, "task", deadline, Amount::new(10)).unwrap();
        let f = ledger.fulfil(&Identity::new("worker"), b, "done").unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let accept = {
            let (ledger, barrier, issuer) =
                (Arc::clone(&ledger), Arc::clone(&barrier), issuer.clone());
            thread::spawn(move || {
                barrier.wait();
                ledger.accept_fulfilment(&issuer, b, f)
            })
        };
        let cancel = {
            let (ledger, barrier, issuer) =
                (Arc::clone(&ledger), Arc::clone(&barrier), issuer.clone());
            thread::spawn(move || {
                barrier.wait();
                ledger.cancel_bounty(&issuer, b)
            })
        };
        let accepted = accept.join().unwrap().is_ok();
        let cancelled = cancel.join().unwrap().is_ok();
        assert!(accepted ^ cancelled);

        let worker = transfer.balance(&Identity::new("worker"));
        let refund = transfer.balance(&issuer);
        assert_eq!(worker.checked_add(refund), Some(Amount::new(10)));
        assert_eq!(transfer.escrowed_total(), Amount::ZERO);
    }
}

#[test]
fn concurrent_issues_get_distinct_dense_ids() {
    let (ledger, _) = shared_ledger(64);
    let issuer = Identity::new("issuer");
    let deadline = ledger.clock().now().plus_secs(1_000);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let issuer = issuer.clone();
            thread::spawn(move || {
                (0..8)
                    .map(|_| {
                        ledger
                            .issue(&issuer, "t", deadline, Amount::new(1))
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<BountyId> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort();
    let expected: Vec<BountyId> = (0..64).map(BountyId::new).collect();
    assert_eq!(ids, expected);
    assert_eq!(ledger.escrowed_total().unwrap(), Amount::new(64));
}

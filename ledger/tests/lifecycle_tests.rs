//! End-to-end bounty lifecycles, over the in-memory doubles and over LMDB.

use std::sync::Arc;

use bounty_ledger::{BountyLedger, LedgerError};
use bounty_nullables::{NullClock, NullStore, NullTransfer};
use bounty_store::StoreVault;
use bounty_store_lmdb::{LmdbBountyStore, LmdbEnvironment, LmdbVaultStore};
use bounty_types::{Amount, BountyId, BountyStatus, Clock, EscrowId, FulfilmentId, Identity};

const DAY: u64 = 86_400;
const REWARD: u128 = 500_000_000_000;

fn alice() -> Identity {
    Identity::new("alice")
}

fn bob() -> Identity {
    Identity::new("bob")
}

type NullLedger = BountyLedger<Arc<NullStore>, Arc<NullTransfer>, Arc<NullClock>>;

/// A ledger over the doubles, plus the test's own handles on them.
fn null_ledger() -> (NullLedger, Arc<NullStore>, Arc<NullTransfer>) {
    let store = Arc::new(NullStore::new());
    let transfer = Arc::new(NullTransfer::new().with_balance("alice", REWARD));
    let ledger = BountyLedger::new(
        Arc::clone(&store),
        Arc::clone(&transfer),
        Arc::new(NullClock::new(1_700_000_000)),
    );
    (ledger, store, transfer)
}

#[test]
fn issue_fulfil_accept_pays_fulfiler() {
    let (ledger, _, transfer) = null_ledger();
    let deadline = ledger.clock().now().plus_secs(2 * DAY);

    let b = ledger
        .issue(&alice(), "write docs", deadline, Amount::new(REWARD))
        .unwrap();
    assert_eq!(b, BountyId::new(0));
    let bounty = ledger.bounty(b).unwrap();
    assert_eq!(bounty.status, BountyStatus::Open);
    assert_eq!(bounty.amount, Amount::new(REWARD));
    assert_eq!(ledger.escrowed_total().unwrap(), Amount::new(REWARD));

    let f = ledger.fulfil(&bob(), b, "docs.md").unwrap();
    assert_eq!(f, FulfilmentId::new(0));

    ledger.accept_fulfilment(&alice(), b, f).unwrap();
    assert_eq!(ledger.bounty(b).unwrap().status, BountyStatus::Paid);
    assert_eq!(transfer.balance(&bob()), Amount::new(REWARD));
    assert_eq!(transfer.balance(&alice()), Amount::ZERO);
    assert_eq!(ledger.escrowed_total().unwrap(), Amount::ZERO);

    let err = ledger.accept_fulfilment(&alice(), b, f).unwrap_err();
    assert!(matches!(err, LedgerError::FulfilmentAlreadyAccepted { .. }));
    assert_eq!(transfer.balance(&bob()), Amount::new(REWARD));
}

#[test]
fn cancel_then_accept_is_refused() {
    let (ledger, _, transfer) = null_ledger();
    let deadline = ledger.clock().now().plus_secs(2 * DAY);
    let b = ledger
        .issue(&alice(), "write docs", deadline, Amount::new(REWARD))
        .unwrap();
    let f = ledger.fulfil(&bob(), b, "docs.md").unwrap();

    ledger.cancel_bounty(&alice(), b).unwrap();
    assert_eq!(transfer.balance(&alice()), Amount::new(REWARD));

    let err = ledger.accept_fulfilment(&alice(), b, f).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::BountyNotOpen {
            status: BountyStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(transfer.balance(&bob()), Amount::ZERO);
    assert!(!ledger.fulfilment(b, f).unwrap().accepted);
}

#[test]
fn fulfil_after_deadline_is_refused() {
    let (ledger, _, _) = null_ledger();
    let clock = Arc::clone(ledger.clock());
    let b = ledger
        .issue(&alice(), "x", clock.now().plus_secs(DAY), Amount::new(1))
        .unwrap();
    clock.advance(DAY - 1);
    ledger.fulfil(&bob(), b, "just in time").unwrap();
    clock.advance(1);
    let err = ledger.fulfil(&bob(), b, "too late").unwrap_err();
    assert!(matches!(err, LedgerError::DeadlinePassed { .. }));
    assert_eq!(ledger.bounty(b).unwrap().fulfilments.len(), 1);
}

#[test]
fn readers_see_escrow_ids_not_handles() {
    let (ledger, _, transfer) = null_ledger();
    let deadline = ledger.clock().now().plus_secs(DAY);
    let b = ledger
        .issue(&alice(), "x", deadline, Amount::new(REWARD))
        .unwrap();

    let escrow: Option<EscrowId> = ledger.bounty(b).unwrap().escrow;
    assert_eq!(escrow, Some(EscrowId::new(0)));
    let listed: Vec<Option<EscrowId>> = ledger
        .bounties()
        .unwrap()
        .into_iter()
        .map(|r| r.escrow)
        .collect();
    assert_eq!(listed, vec![escrow]);

    // Reading leaves the claim with the bounty, so the issuer can still cancel.
    ledger.cancel_bounty(&alice(), b).unwrap();
    assert_eq!(transfer.balance(&alice()), Amount::new(REWARD));
    assert!(transfer.releases().iter().all(|r| r.to == alice()));
}

#[test]
fn interrupted_cancel_is_finished_by_reconcile() {
    let (ledger, store, transfer) = null_ledger();
    let deadline = ledger.clock().now().plus_secs(DAY);
    let b = ledger
        .issue(&alice(), "x", deadline, Amount::new(REWARD))
        .unwrap();

    transfer.fail_next_releases(1);
    store.fail_puts_after(1, 1);
    let err = ledger.cancel_bounty(&alice(), b).unwrap_err();
    assert!(matches!(err, LedgerError::Storage(_)));
    assert_eq!(transfer.escrowed_total(), Amount::new(REWARD));

    let err = ledger.cancel_bounty(&alice(), b).unwrap_err();
    assert!(matches!(err, LedgerError::BountyNotOpen { .. }));

    assert_eq!(ledger.reconcile().unwrap(), 1);
    assert_eq!(transfer.balance(&alice()), Amount::new(REWARD));
    assert_eq!(transfer.escrowed_total(), Amount::ZERO);
    assert_eq!(ledger.bounty(b).unwrap().escrow, None);
}

struct LmdbHarness {
    _dir: tempfile::TempDir,
    env: LmdbEnvironment,
}

impl LmdbHarness {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).expect("open env");
        Self { _dir: dir, env }
    }

    fn ledger(
        &self,
        clock: Arc<NullClock>,
    ) -> BountyLedger<LmdbBountyStore, StoreVault<LmdbVaultStore>, Arc<NullClock>> {
        BountyLedger::new(
            self.env.bounty_store(),
            StoreVault::new(self.env.vault_store()),
            clock,
        )
    }

    /// An independent handle on the custody book.
    fn vault(&self) -> StoreVault<LmdbVaultStore> {
        StoreVault::new(self.env.vault_store())
    }
}

#[test]
fn lmdb_lifecycle_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(NullClock::new(1_700_000_000));
    let deadline = clock.now().plus_secs(2 * DAY);

    {
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let ledger = BountyLedger::new(
            env.bounty_store(),
            StoreVault::new(env.vault_store()),
            Arc::clone(&clock),
        );
        StoreVault::new(env.vault_store())
            .deposit(&alice(), Amount::new(REWARD))
            .unwrap();
        ledger
            .issue(&alice(), "write docs", deadline, Amount::new(REWARD))
            .unwrap();
        ledger.fulfil(&bob(), BountyId::new(0), "docs.md").unwrap();
    }

    let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
    assert!(env.check_integrity().unwrap().is_healthy());
    let ledger = BountyLedger::new(
        env.bounty_store(),
        StoreVault::new(env.vault_store()),
        Arc::clone(&clock),
    );
    assert_eq!(ledger.escrowed_total().unwrap(), Amount::new(REWARD));
    let vault = StoreVault::new(env.vault_store());

    ledger
        .accept_fulfilment(&alice(), BountyId::new(0), FulfilmentId::new(0))
        .unwrap();
    assert_eq!(vault.balance(&bob()).unwrap(), Amount::new(REWARD));
    assert_eq!(vault.escrowed_total().unwrap(), Amount::ZERO);
    assert!(env.check_integrity().unwrap().is_healthy());

    let next = ledger
        .issue(&bob(), "review", deadline, Amount::new(1))
        .unwrap();
    assert_eq!(next, BountyId::new(1));
}

#[test]
fn lmdb_cancel_refunds_and_keeps_books_consistent() {
    let harness = LmdbHarness::new();
    let clock = Arc::new(NullClock::new(10));
    let ledger = harness.ledger(Arc::clone(&clock));
    let vault = harness.vault();
    vault.deposit(&alice(), Amount::new(300)).unwrap();

    let a = ledger
        .issue(&alice(), "a", clock.now().plus_secs(100), Amount::new(100))
        .unwrap();
    let b = ledger
        .issue(&alice(), "b", clock.now().plus_secs(100), Amount::new(200))
        .unwrap();
    assert_eq!(vault.balance(&alice()).unwrap(), Amount::ZERO);

    ledger.cancel_bounty(&alice(), a).unwrap();
    let err = ledger.cancel_bounty(&alice(), a).unwrap_err();
    assert!(matches!(err, LedgerError::BountyNotOpen { .. }));

    assert_eq!(vault.balance(&alice()).unwrap(), Amount::new(100));
    assert_eq!(ledger.escrowed_total().unwrap(), Amount::new(200));
    assert_eq!(
        vault.escrowed_total().unwrap(),
        ledger.escrowed_total().unwrap()
    );
    assert_eq!(ledger.open_bounties().unwrap()[0].id, b);
    assert!(harness.env.check_integrity().unwrap().is_healthy());
}

#[test]
fn lmdb_issue_without_funds_leaves_no_trace() {
    let harness = LmdbHarness::new();
    let clock = Arc::new(NullClock::new(10));
    let ledger = harness.ledger(Arc::clone(&clock));

    let err = ledger
        .issue(&alice(), "a", clock.now().plus_secs(100), Amount::new(1))
        .unwrap_err();
    assert!(matches!(err, LedgerError::EscrowTransferFailed { .. }));
    assert_eq!(ledger.bounty_count().unwrap(), 0);
    assert_eq!(harness.env.vault_store().escrow_count().unwrap(), 0);
}

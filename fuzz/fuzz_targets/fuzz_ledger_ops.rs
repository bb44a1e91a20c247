#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use bounty_ledger::BountyLedger;
use bounty_nullables::{NullClock, NullStore, NullTransfer};
use bounty_types::{Amount, BountyId, Clock, FulfilmentId, Identity};

const PARTIES: [&str; 3] = ["alice", "bob", "carol"];
const FUNDS: u128 = 1 << 64;

#[derive(Arbitrary, Debug)]
enum Op {
    Issue { who: u8, amount: u64, ttl: u16 },
    Fulfil { who: u8, bounty: u8, data: Vec<u8> },
    Accept { who: u8, bounty: u8, fulfilment: u8 },
    Cancel { who: u8, bounty: u8 },
    Advance { secs: u16 },
    FailNextRelease,
    FailNextPut,
    FailSecondPut,
    Reconcile,
}

fn party(who: u8) -> Identity {
    Identity::new(PARTIES[who as usize % PARTIES.len()])
}

fuzz_target!(|ops: Vec<Op>| {
    let clock = Arc::new(NullClock::new(1_000));
    let mut transfer = NullTransfer::new();
    for name in PARTIES {
        transfer = transfer.with_balance(name, FUNDS);
    }
    let transfer = Arc::new(transfer);
    let store = Arc::new(NullStore::new());
    let ledger = BountyLedger::new(Arc::clone(&store), Arc::clone(&transfer), Arc::clone(&clock));

    for op in ops {
        match op {
            Op::Issue { who, amount, ttl } => {
                let deadline = clock.now().plus_secs(u64::from(ttl));
                let _ = ledger.issue(&party(who), "t", deadline, Amount::new(u128::from(amount)));
            }
            Op::Fulfil { who, bounty, data } => {
                let _ = ledger.fulfil(&party(who), BountyId::new(u64::from(bounty)), data);
            }
            Op::Accept { who, bounty, fulfilment } => {
                let _ = ledger.accept_fulfilment(
                    &party(who),
                    BountyId::new(u64::from(bounty)),
                    FulfilmentId::new(u64::from(fulfilment)),
                );
            }
            Op::Cancel { who, bounty } => {
                let _ = ledger.cancel_bounty(&party(who), BountyId::new(u64::from(bounty)));
            }
            Op::Advance { secs } => clock.advance(u64::from(secs)),
            Op::FailNextRelease => transfer.fail_next_releases(1),
            Op::FailNextPut => store.fail_next_puts(1),
            Op::FailSecondPut => store.fail_puts_after(1, 1),
            Op::Reconcile => {
                let _ = ledger.reconcile();
            }
        }

        let held: u128 = PARTIES
            .iter()
            .map(|p| transfer.balance(&Identity::new(*p)).raw())
            .sum();
        let escrowed = transfer.escrowed_total();
        assert_eq!(held + escrowed.raw(), FUNDS * PARTIES.len() as u128);
    }

    transfer.fail_next_releases(0);
    store.fail_next_puts(0);
    ledger.reconcile().expect("reconcile with no injected failures");
    assert_eq!(ledger.owed_refunds(), 0);
    assert_eq!(ledger.escrowed_total().ok(), Some(transfer.escrowed_total()));

    for bounty in ledger.bounties().unwrap_or_default() {
        assert!(bounty.fulfilments.iter().filter(|f| f.accepted).count() <= 1);
        assert_eq!(bounty.is_open(), bounty.escrow.is_some());
    }
});

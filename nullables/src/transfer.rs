//! Nullable value transfer: an in-memory custody book with injectable failures.

use bounty_store::{ReleaseFailure, StoreVault, TransferError, ValueTransfer};
use bounty_types::{Amount, EscrowHandle, EscrowId, Identity};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::NullStore;

/// A successful release, as observed by the test double.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub escrow: EscrowId,
    pub to: Identity,
    pub amount: Amount,
}

/// A value-transfer collaborator for tests.
///
/// Backed by a [`StoreVault`] over a [`NullStore`], so balances and escrow
/// entries behave like the real thing. Escrow and release calls can be made
/// to fail on demand, and every successful release is recorded.
pub struct NullTransfer {
    vault: StoreVault<NullStore>,
    failing_escrows: AtomicU32,
    failing_releases: AtomicU32,
    releases: Mutex<Vec<ReleaseRecord>>,
}

impl NullTransfer {
    pub fn new() -> Self {
        Self {
            vault: StoreVault::new(NullStore::new()),
            failing_escrows: AtomicU32::new(0),
            failing_releases: AtomicU32::new(0),
            releases: Mutex::new(Vec::new()),
        }
    }

    /// Builder: start `owner` with `amount` of spendable value.
    pub fn with_balance(self, owner: &str, amount: u128) -> Self {
        self.fund(&Identity::new(owner), Amount::new(amount));
        self
    }

    pub fn fund(&self, owner: &Identity, amount: Amount) {
        self.vault
            .deposit(owner, amount)
            .expect("in-memory deposit cannot fail below u128::MAX");
    }

    pub fn balance(&self, owner: &Identity) -> Amount {
        self.vault.balance(owner).unwrap_or(Amount::ZERO)
    }

    pub fn escrowed_total(&self) -> Amount {
        self.vault.escrowed_total().unwrap_or(Amount::ZERO)
    }

    /// Make the next `n` escrow calls fail.
    pub fn fail_next_escrows(&self, n: u32) {
        self.failing_escrows.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` release calls fail (the handle is handed back).
    pub fn fail_next_releases(&self, n: u32) {
        self.failing_releases.store(n, Ordering::SeqCst);
    }

    /// All successful releases so far, in order.
    pub fn releases(&self) -> Vec<ReleaseRecord> {
        self.releases.lock().unwrap().clone()
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for NullTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueTransfer for NullTransfer {
    fn escrow(&self, from: &Identity, amount: Amount) -> Result<EscrowHandle, TransferError> {
        if Self::take(&self.failing_escrows) {
            return Err(TransferError::Rejected("injected escrow failure".to_string()));
        }
        self.vault.escrow(from, amount)
    }

    fn release(&self, handle: EscrowHandle, to: &Identity) -> Result<(), ReleaseFailure> {
        if Self::take(&self.failing_releases) {
            return Err(ReleaseFailure::new(
                handle,
                TransferError::Rejected("injected release failure".to_string()),
            ));
        }
        let record = ReleaseRecord {
            escrow: handle.id(),
            to: to.clone(),
            amount: handle.amount(),
        };
        self.vault.release(handle, to)?;
        self.releases.lock().unwrap().push(record);
        Ok(())
    }
}

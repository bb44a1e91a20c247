//! Nullable store: thread-safe in-memory storage for testing.

use bounty_store::{BountyStore, StoreError, VaultStore};
use bounty_types::{Amount, Bounty, BountyId, EscrowId, Identity};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct VaultBook {
    balances: HashMap<Identity, Amount>,
    escrows: BTreeMap<EscrowId, (Identity, Amount)>,
    next_escrow: u64,
}

/// An in-memory bounty arena + custody book for testing.
///
/// Bounty records are kept bincode-encoded, the same way a persistent
/// backend holds them, so reads hand out fresh copies.
pub struct NullStore {
    bounties: Mutex<BTreeMap<BountyId, Vec<u8>>>,
    vault: Mutex<VaultBook>,
    puts_before_failure: AtomicU32,
    failing_puts: AtomicU32,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            bounties: Mutex::new(BTreeMap::new()),
            vault: Mutex::new(VaultBook::default()),
            puts_before_failure: AtomicU32::new(0),
            failing_puts: AtomicU32::new(0),
        }
    }

    /// Make the next `n` calls to `put_bounty` fail with a backend error.
    pub fn fail_next_puts(&self, n: u32) {
        self.fail_puts_after(0, n);
    }

    /// Let `skip` calls to `put_bounty` through, then fail the `n` after them.
    pub fn fail_puts_after(&self, skip: u32, n: u32) {
        self.puts_before_failure.store(skip, Ordering::SeqCst);
        self.failing_puts.store(n, Ordering::SeqCst);
    }

    /// Number of outstanding escrow entries.
    pub fn escrow_count(&self) -> usize {
        self.vault.lock().unwrap().escrows.len()
    }

    fn take_put_failure(&self) -> bool {
        if self
            .puts_before_failure
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return false;
        }
        self.failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BountyStore for NullStore {
    fn put_bounty(&self, bounty: &Bounty) -> Result<(), StoreError> {
        if self.take_put_failure() {
            return Err(StoreError::Backend("injected put failure".to_string()));
        }
        let bytes =
            bincode::serialize(bounty).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.bounties.lock().unwrap().insert(bounty.id, bytes);
        Ok(())
    }

    fn get_bounty(&self, id: BountyId) -> Result<Bounty, StoreError> {
        let bounties = self.bounties.lock().unwrap();
        let bytes = bounties
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("bounty {id}")))?;
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn bounty_count(&self) -> Result<u64, StoreError> {
        Ok(self.bounties.lock().unwrap().len() as u64)
    }

    fn iter_bounties(&self) -> Result<Vec<Bounty>, StoreError> {
        self.bounties
            .lock()
            .unwrap()
            .values()
            .map(|bytes| {
                bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect()
    }
}

impl VaultStore for NullStore {
    fn balance(&self, owner: &Identity) -> Result<Amount, StoreError> {
        Ok(self
            .vault
            .lock()
            .unwrap()
            .balances
            .get(owner)
            .copied()
            .unwrap_or(Amount::ZERO))
    }

    fn credit(&self, owner: &Identity, amount: Amount) -> Result<Amount, StoreError> {
        let mut book = self.vault.lock().unwrap();
        let balance = book.balances.entry(owner.clone()).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| StoreError::Overflow(owner.to_string()))?;
        Ok(*balance)
    }

    fn lock(&self, owner: &Identity, amount: Amount) -> Result<EscrowId, StoreError> {
        let mut book = self.vault.lock().unwrap();
        let available = book.balances.get(owner).copied().unwrap_or(Amount::ZERO);
        let remaining = available
            .checked_sub(amount)
            .ok_or(StoreError::InsufficientBalance {
                needed: amount.raw(),
                available: available.raw(),
            })?;
        let id = EscrowId::new(book.next_escrow);
        book.next_escrow += 1;
        book.balances.insert(owner.clone(), remaining);
        book.escrows.insert(id, (owner.clone(), amount));
        Ok(id)
    }

    fn unlock(&self, id: EscrowId, to: &Identity) -> Result<Amount, StoreError> {
        let mut book = self.vault.lock().unwrap();
        let (_, amount) = book
            .escrows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let balance = book
            .balances
            .get(to)
            .copied()
            .unwrap_or(Amount::ZERO)
            .checked_add(amount)
            .ok_or_else(|| StoreError::Overflow(to.to_string()))?;
        book.escrows.remove(&id);
        book.balances.insert(to.clone(), balance);
        Ok(amount)
    }

    fn escrowed_total(&self) -> Result<Amount, StoreError> {
        Ok(self
            .vault
            .lock()
            .unwrap()
            .escrows
            .values()
            .map(|(_, amount)| *amount)
            .sum())
    }
}

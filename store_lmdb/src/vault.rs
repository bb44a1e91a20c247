//! LMDB implementation of VaultStore.
//!
//! `lock` and `unlock` each run in a single write transaction, so a balance
//! change and its escrow entry commit together or not at all.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn, RwTxn};
use serde::{Deserialize, Serialize};

use bounty_store::{StoreError, VaultStore};
use bounty_types::{Amount, EscrowId, Identity};

use crate::meta::{read_u64, write_u64, NEXT_ESCROW_ID_KEY};
use crate::LmdbError;

/// Value stored per outstanding escrow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEntry {
    pub depositor: Identity,
    pub amount: Amount,
}

#[derive(Clone)]
pub struct LmdbVaultStore {
    pub(crate) env: Arc<Env>,
    pub(crate) balances_db: Database<Bytes, Bytes>,
    pub(crate) escrows_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbVaultStore {
    fn read_balance(&self, txn: &RoTxn, owner: &Identity) -> Result<Amount, LmdbError> {
        match self.balances_db.get(txn, owner.as_bytes())? {
            Some(bytes) => {
                let arr: [u8; 16] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization(format!("balance of {owner} has bad length"))
                })?;
                Ok(Amount::from_le_bytes(arr))
            }
            None => Ok(Amount::ZERO),
        }
    }

    fn write_balance(
        &self,
        txn: &mut RwTxn,
        owner: &Identity,
        amount: Amount,
    ) -> Result<(), LmdbError> {
        self.balances_db
            .put(txn, owner.as_bytes(), &amount.to_le_bytes())?;
        Ok(())
    }

    /// Look up an outstanding escrow entry.
    pub fn escrow_entry(&self, id: EscrowId) -> Result<Option<EscrowEntry>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let entry = match self
            .escrows_db
            .get(&rtxn, &id.to_be_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Some(bincode::deserialize(bytes).map_err(LmdbError::from)?),
            None => None,
        };
        Ok(entry)
    }

    /// Number of outstanding escrow entries.
    pub fn escrow_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.escrows_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}

impl VaultStore for LmdbVaultStore {
    fn balance(&self, owner: &Identity) -> Result<Amount, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_balance(&rtxn, owner)?)
    }

    fn credit(&self, owner: &Identity, amount: Amount) -> Result<Amount, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let balance = self
            .read_balance(&wtxn, owner)?
            .checked_add(amount)
            .ok_or_else(|| StoreError::Overflow(owner.to_string()))?;
        self.write_balance(&mut wtxn, owner, balance)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(balance)
    }

    fn lock(&self, owner: &Identity, amount: Amount) -> Result<EscrowId, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let available = self.read_balance(&wtxn, owner)?;
        let remaining =
            available
                .checked_sub(amount)
                .ok_or(StoreError::InsufficientBalance {
                    needed: amount.raw(),
                    available: available.raw(),
                })?;

        let next = read_u64(&self.meta_db, &wtxn, NEXT_ESCROW_ID_KEY)?.unwrap_or(0);
        let id = EscrowId::new(next);
        let entry = EscrowEntry {
            depositor: owner.clone(),
            amount,
        };
        let bytes = bincode::serialize(&entry).map_err(LmdbError::from)?;
        self.escrows_db
            .put(&mut wtxn, &id.to_be_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        self.write_balance(&mut wtxn, owner, remaining)?;
        write_u64(&self.meta_db, &mut wtxn, NEXT_ESCROW_ID_KEY, next + 1)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(id)
    }

    fn unlock(&self, id: EscrowId, to: &Identity) -> Result<Amount, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let entry: EscrowEntry = match self
            .escrows_db
            .get(&wtxn, &id.to_be_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => bincode::deserialize(bytes).map_err(LmdbError::from)?,
            None => return Err(StoreError::NotFound(id.to_string())),
        };
        let balance = self
            .read_balance(&wtxn, to)?
            .checked_add(entry.amount)
            .ok_or_else(|| StoreError::Overflow(to.to_string()))?;
        self.escrows_db
            .delete(&mut wtxn, &id.to_be_bytes())
            .map_err(LmdbError::from)?;
        self.write_balance(&mut wtxn, to, balance)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(entry.amount)
    }

    fn escrowed_total(&self) -> Result<Amount, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut total = Amount::ZERO;
        for result in self.escrows_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, val) = result.map_err(LmdbError::from)?;
            let entry: EscrowEntry = bincode::deserialize(val).map_err(LmdbError::from)?;
            total = total
                .checked_add(entry.amount)
                .ok_or_else(|| StoreError::Overflow("escrowed total".to_string()))?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).expect("open env");
        (dir, env)
    }

    #[test]
    fn credit_accumulates() {
        let (_dir, env) = temp_env();
        let vault = env.vault_store();
        let alice = Identity::new("alice");
        assert_eq!(vault.balance(&alice).unwrap(), Amount::ZERO);
        vault.credit(&alice, Amount::new(40)).unwrap();
        assert_eq!(vault.credit(&alice, Amount::new(2)).unwrap(), Amount::new(42));
    }

    #[test]
    fn lock_moves_balance_into_escrow() {
        let (_dir, env) = temp_env();
        let vault = env.vault_store();
        let alice = Identity::new("alice");
        vault.credit(&alice, Amount::new(100)).unwrap();

        let first = vault.lock(&alice, Amount::new(30)).unwrap();
        let second = vault.lock(&alice, Amount::new(20)).unwrap();
        assert_eq!(first, EscrowId::new(0));
        assert_eq!(second, EscrowId::new(1));
        assert_eq!(vault.balance(&alice).unwrap(), Amount::new(50));
        assert_eq!(vault.escrowed_total().unwrap(), Amount::new(50));
        assert_eq!(
            vault.escrow_entry(first).unwrap(),
            Some(EscrowEntry {
                depositor: alice.clone(),
                amount: Amount::new(30)
            })
        );
    }

    #[test]
    fn lock_with_short_balance_changes_nothing() {
        let (_dir, env) = temp_env();
        let vault = env.vault_store();
        let alice = Identity::new("alice");
        vault.credit(&alice, Amount::new(10)).unwrap();

        let err = vault.lock(&alice, Amount::new(11)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientBalance {
                needed: 11,
                available: 10
            }
        ));
        assert_eq!(vault.balance(&alice).unwrap(), Amount::new(10));
        assert_eq!(vault.escrow_count().unwrap(), 0);
    }

    #[test]
    fn unlock_pays_once() {
        let (_dir, env) = temp_env();
        let vault = env.vault_store();
        let alice = Identity::new("alice");
        let bob = Identity::new("bob");
        vault.credit(&alice, Amount::new(100)).unwrap();
        let id = vault.lock(&alice, Amount::new(100)).unwrap();

        assert_eq!(vault.unlock(id, &bob).unwrap(), Amount::new(100));
        assert_eq!(vault.balance(&bob).unwrap(), Amount::new(100));
        assert_eq!(vault.escrowed_total().unwrap(), Amount::ZERO);

        assert!(matches!(vault.unlock(id, &bob), Err(StoreError::NotFound(_))));
        assert_eq!(vault.balance(&bob).unwrap(), Amount::new(100));
    }

    #[test]
    fn escrow_ids_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let alice = Identity::new("alice");
        {
            let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
            let vault = env.vault_store();
            vault.credit(&alice, Amount::new(5)).unwrap();
            vault.lock(&alice, Amount::new(1)).unwrap();
        }
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let vault = env.vault_store();
        assert_eq!(vault.balance(&alice).unwrap(), Amount::new(4));
        assert_eq!(vault.lock(&alice, Amount::new(1)).unwrap(), EscrowId::new(1));
    }
}

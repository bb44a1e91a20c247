//! The value-transfer collaborator and its store-backed implementation.

use std::sync::Arc;

use bounty_types::{Amount, EscrowHandle, EscrowId, Identity};
use thiserror::Error;

use crate::{StoreError, VaultStore};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u128, available: u128 },

    #[error("{0} is unknown or already released")]
    UnknownEscrow(EscrowId),

    #[error("transfer rejected: {0}")]
    Rejected(String),

    #[error("transfer backend failure: {0}")]
    Backend(String),
}

/// A release that did not happen. Carries the handle back so the caller
/// still owns the escrow claim.
#[derive(Debug, Error)]
#[error("release of {} failed: {reason}", .handle.id())]
pub struct ReleaseFailure {
    pub handle: EscrowHandle,
    #[source]
    pub reason: TransferError,
}

impl ReleaseFailure {
    pub fn new(handle: EscrowHandle, reason: TransferError) -> Self {
        Self { handle, reason }
    }
}

/// Moves value into and out of escrow.
///
/// Both calls are synchronous and resolve to a definite outcome: on `Err`
/// nothing moved. Releasing consumes the handle, so each escrow is released
/// at most once.
pub trait ValueTransfer {
    /// Move `amount` from `from` into a new escrow.
    fn escrow(&self, from: &Identity, amount: Amount) -> Result<EscrowHandle, TransferError>;

    /// Pay the escrowed value to `to`.
    fn release(&self, handle: EscrowHandle, to: &Identity) -> Result<(), ReleaseFailure>;
}

impl<T: ValueTransfer + ?Sized> ValueTransfer for &T {
    fn escrow(&self, from: &Identity, amount: Amount) -> Result<EscrowHandle, TransferError> {
        (**self).escrow(from, amount)
    }

    fn release(&self, handle: EscrowHandle, to: &Identity) -> Result<(), ReleaseFailure> {
        (**self).release(handle, to)
    }
}

impl<T: ValueTransfer + ?Sized> ValueTransfer for Arc<T> {
    fn escrow(&self, from: &Identity, amount: Amount) -> Result<EscrowHandle, TransferError> {
        (**self).escrow(from, amount)
    }

    fn release(&self, handle: EscrowHandle, to: &Identity) -> Result<(), ReleaseFailure> {
        (**self).release(handle, to)
    }
}

/// [`ValueTransfer`] over a [`VaultStore`] custody book.
///
/// Escrowing debits the depositor's balance into a new escrow entry; releasing
/// deletes the entry and credits the recipient. Because the entry is gone
/// after the first release, a forged or resurrected handle cannot pay twice.
pub struct StoreVault<V> {
    store: V,
}

impl<V: VaultStore> StoreVault<V> {
    pub fn new(store: V) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &V {
        &self.store
    }

    /// Credit externally supplied value to `owner`.
    pub fn deposit(&self, owner: &Identity, amount: Amount) -> Result<Amount, StoreError> {
        let balance = self.store.credit(owner, amount)?;
        tracing::debug!(owner = %owner, amount = %amount, balance = %balance, "deposit");
        Ok(balance)
    }

    pub fn balance(&self, owner: &Identity) -> Result<Amount, StoreError> {
        self.store.balance(owner)
    }

    pub fn escrowed_total(&self) -> Result<Amount, StoreError> {
        self.store.escrowed_total()
    }
}

impl<V: VaultStore> ValueTransfer for StoreVault<V> {
    fn escrow(&self, from: &Identity, amount: Amount) -> Result<EscrowHandle, TransferError> {
        let id = self.store.lock(from, amount).map_err(|e| match e {
            StoreError::InsufficientBalance { needed, available } => {
                TransferError::InsufficientFunds { needed, available }
            }
            other => TransferError::Backend(other.to_string()),
        })?;
        tracing::debug!(escrow = %id, from = %from, amount = %amount, "value escrowed");
        Ok(EscrowHandle::new(id, from.clone(), amount))
    }

    fn release(&self, handle: EscrowHandle, to: &Identity) -> Result<(), ReleaseFailure> {
        match self.store.unlock(handle.id(), to) {
            Ok(released) => {
                if released != handle.amount() {
                    tracing::warn!(
                        escrow = %handle.id(),
                        held = %released,
                        claimed = %handle.amount(),
                        "escrow entry amount differs from handle"
                    );
                }
                tracing::debug!(escrow = %handle.id(), to = %to, amount = %released, "escrow released");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => {
                let id = handle.id();
                Err(ReleaseFailure::new(handle, TransferError::UnknownEscrow(id)))
            }
            Err(other) => Err(ReleaseFailure::new(
                handle,
                TransferError::Backend(other.to_string()),
            )),
        }
    }
}

//! Custody book storage trait.

use crate::StoreError;
use bounty_types::{Amount, EscrowId, Identity};

/// Balances of value held on behalf of identities, plus the escrow entries
/// locked out of those balances.
///
/// `lock` and `unlock` must each be atomic: either the balance and the escrow
/// entry both change or neither does.
pub trait VaultStore {
    /// Spendable balance of `owner` (zero if never credited).
    fn balance(&self, owner: &Identity) -> Result<Amount, StoreError>;

    /// Add value to `owner`'s balance. Returns the new balance.
    fn credit(&self, owner: &Identity, amount: Amount) -> Result<Amount, StoreError>;

    /// Move `amount` out of `owner`'s balance into a fresh escrow entry.
    ///
    /// Fails with `StoreError::InsufficientBalance` when the balance is short.
    fn lock(&self, owner: &Identity, amount: Amount) -> Result<EscrowId, StoreError>;

    /// Remove escrow entry `id` and credit its amount to `to`.
    ///
    /// Fails with `StoreError::NotFound` when the entry does not exist
    /// (never locked, or already unlocked). Returns the released amount.
    fn unlock(&self, id: EscrowId, to: &Identity) -> Result<Amount, StoreError>;

    /// Sum of all outstanding escrow entries.
    fn escrowed_total(&self) -> Result<Amount, StoreError>;
}

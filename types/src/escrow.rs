//! Escrow handles: the claim a bounty holds on its escrowed value.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Amount, Identity};

/// Identifier of one escrow entry in a value-transfer backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EscrowId(u64);

impl EscrowId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for EscrowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "escrow#{}", self.0)
    }
}

/// Proof that `amount` was moved from `depositor` into escrow.
///
/// Deliberately neither `Clone` nor `Copy`: releasing consumes the handle, so
/// a bounty can hand its escrow out at most once. A failed release gives the
/// handle back to the caller.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowHandle {
    id: EscrowId,
    depositor: Identity,
    amount: Amount,
}

impl EscrowHandle {
    /// Mint a handle. Only value-transfer backends should call this.
    pub fn new(id: EscrowId, depositor: Identity, amount: Amount) -> Self {
        Self {
            id,
            depositor,
            amount,
        }
    }

    pub fn id(&self) -> EscrowId {
        self.id
    }

    pub fn depositor(&self) -> &Identity {
        &self.depositor
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

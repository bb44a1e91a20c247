use thiserror::Error;

use bounty_store::{StoreError, TransferError};
use bounty_types::{BountyId, BountyStatus, FulfilmentId, Identity, Timestamp};

/// Why a ledger operation was refused.
///
/// Every variant except `Storage` is a caller-facing precondition failure and
/// guarantees the ledger committed nothing.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid bounty parameters: {reason}")]
    InvalidBountyParameters { reason: String },

    #[error("bounty {0} not found")]
    BountyNotFound(BountyId),

    #[error("fulfilment {fulfilment} of bounty {bounty} not found")]
    FulfilmentNotFound {
        bounty: BountyId,
        fulfilment: FulfilmentId,
    },

    #[error("bounty {bounty} is {status}, not open")]
    BountyNotOpen {
        bounty: BountyId,
        status: BountyStatus,
    },

    #[error("deadline of bounty {bounty} was {deadline}, now is {now}")]
    DeadlinePassed {
        bounty: BountyId,
        deadline: Timestamp,
        now: Timestamp,
    },

    #[error("{caller} issued bounty {bounty} and cannot fulfil it")]
    SelfFulfilmentForbidden { bounty: BountyId, caller: Identity },

    #[error("{caller} is not the issuer of bounty {bounty}")]
    NotIssuer { bounty: BountyId, caller: Identity },

    #[error("fulfilment {fulfilment} of bounty {bounty} is already accepted")]
    FulfilmentAlreadyAccepted {
        bounty: BountyId,
        fulfilment: FulfilmentId,
    },

    #[error("escrow transfer for bounty {bounty} failed: {source}")]
    EscrowTransferFailed {
        bounty: BountyId,
        #[source]
        source: TransferError,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl LedgerError {
    /// Stable name of the failure category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidBountyParameters { .. } => "InvalidBountyParameters",
            Self::BountyNotFound(_) => "BountyNotFound",
            Self::FulfilmentNotFound { .. } => "FulfilmentNotFound",
            Self::BountyNotOpen { .. } => "BountyNotOpen",
            Self::DeadlinePassed { .. } => "DeadlinePassed",
            Self::SelfFulfilmentForbidden { .. } => "SelfFulfilmentForbidden",
            Self::NotIssuer { .. } => "NotIssuer",
            Self::FulfilmentAlreadyAccepted { .. } => "FulfilmentAlreadyAccepted",
            Self::EscrowTransferFailed { .. } => "EscrowTransferFailed",
            Self::Storage(_) => "Storage",
        }
    }
}

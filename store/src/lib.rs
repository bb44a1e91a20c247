//! Abstract storage traits for the bounty ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.
//!
//! Two collections are persisted: the bounty arena ([`BountyStore`]) and the
//! custody book of balances and escrow entries ([`VaultStore`]). The
//! [`ValueTransfer`] collaborator the ledger talks to is usually a
//! [`StoreVault`] over some `VaultStore`.

pub mod bounty;
pub mod error;
pub mod transfer;
pub mod vault;

pub use bounty::BountyStore;
pub use error::StoreError;
pub use transfer::{ReleaseFailure, StoreVault, TransferError, ValueTransfer};
pub use vault::VaultStore;

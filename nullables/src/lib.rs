//! Test doubles for the ledger's collaborators.
//!
//! The ledger reaches time, storage and value custody only through traits
//! (`Clock`, `BountyStore`, `VaultStore`, `ValueTransfer`). The types here
//! implement those traits in memory, answer deterministically, and can be told
//! to fail the next N calls so error paths are reachable from tests.

pub mod clock;
pub mod store;
pub mod transfer;

pub use clock::NullClock;
pub use store::NullStore;
pub use transfer::{NullTransfer, ReleaseRecord};

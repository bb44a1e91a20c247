//! LMDB storage backend for the bounty ledger.
//!
//! Implements the storage traits from `bounty-store` using the `heed` LMDB bindings.
//! Each logical store maps to one or more LMDB databases within a single environment.

pub mod bounty;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod meta;
pub mod migration;
pub mod vault;

pub use bounty::LmdbBountyStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::IntegrityReport;
pub use vault::LmdbVaultStore;

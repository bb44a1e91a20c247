//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::bounty::LmdbBountyStore;
use crate::integrity::{self, IntegrityReport};
use crate::meta::LmdbMetaStore;
use crate::migration::Migrator;
use crate::vault::LmdbVaultStore;
use crate::LmdbError;

/// Number of named databases the environment holds.
const MAX_DBS: u32 = 8;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    /// Bounty records: big-endian id -> bincode `Bounty`.
    pub(crate) bounties_db: Database<Bytes, Bytes>,
    /// Spendable balances: identity bytes -> little-endian u128.
    pub(crate) balances_db: Database<Bytes, Bytes>,
    /// Outstanding escrow entries: big-endian escrow id -> bincode `EscrowEntry`.
    pub(crate) escrows_db: Database<Bytes, Bytes>,
    /// Counters and schema version.
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    ///
    /// Creates the directory if needed, creates every database, and runs
    /// schema migrations.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per path by this process and
        // the memory map is never modified outside of heed transactions.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let bounties_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("bounties"))?;
        let balances_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("balances"))?;
        let escrows_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("escrows"))?;
        let meta_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        let environment = Self {
            env: Arc::new(env),
            bounties_db,
            balances_db,
            escrows_db,
            meta_db,
        };
        Migrator::run(&environment.meta_store())?;
        tracing::info!(path = %path.display(), map_size, "LMDB environment opened");
        Ok(environment)
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// Bounty arena backed by the `bounties` database.
    pub fn bounty_store(&self) -> LmdbBountyStore {
        LmdbBountyStore {
            env: Arc::clone(&self.env),
            bounties_db: self.bounties_db,
        }
    }

    /// Custody book backed by the `balances`, `escrows` and `meta` databases.
    pub fn vault_store(&self) -> LmdbVaultStore {
        LmdbVaultStore {
            env: Arc::clone(&self.env),
            balances_db: self.balances_db,
            escrows_db: self.escrows_db,
            meta_db: self.meta_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }

    /// Cross-check the bounty arena against the escrow book.
    pub fn check_integrity(&self) -> Result<IntegrityReport, LmdbError> {
        integrity::check_integrity(self)
    }
}

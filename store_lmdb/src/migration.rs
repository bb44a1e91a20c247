//! Schema versioning for the LMDB environment.
//!
//! The stored version lives in the `meta` database. Opening an environment
//! applies every step between the stored version and [`CURRENT_SCHEMA_VERSION`]
//! in order, then stamps the new version. A database stamped by a newer build
//! is refused rather than read with the wrong layout.

use crate::meta::LmdbMetaStore;
use crate::LmdbError;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

type Step = fn(&LmdbMetaStore) -> Result<(), LmdbError>;

/// `STEPS[n]` upgrades a version-`n` database to version `n + 1`.
const STEPS: &[Step] = &[create_initial_layout];

/// Version 1: `bounties`, `balances`, `escrows` and `meta`. The databases are
/// created when the environment opens, so there is nothing to rewrite.
fn create_initial_layout(_meta: &LmdbMetaStore) -> Result<(), LmdbError> {
    Ok(())
}

pub struct Migrator;

impl Migrator {
    pub fn run(meta: &LmdbMetaStore) -> Result<(), LmdbError> {
        let stored = meta.schema_version()?;
        if stored > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::UnsupportedSchema {
                found: stored,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        if stored == CURRENT_SCHEMA_VERSION {
            tracing::debug!(version = stored, "schema up to date");
            return Ok(());
        }

        for version in stored..CURRENT_SCHEMA_VERSION {
            let step = step_from(version)?;
            tracing::info!(from = version, to = version + 1, "upgrading schema");
            step(meta)?;
        }
        meta.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        Ok(())
    }
}

fn step_from(version: u32) -> Result<Step, LmdbError> {
    usize::try_from(version)
        .ok()
        .and_then(|i| STEPS.get(i).copied())
        .ok_or(LmdbError::UnsupportedSchema {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        })
}

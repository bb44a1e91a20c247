//! Metadata counters kept in the `meta` database.
//!
//! Values are fixed-width little-endian integers.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn, RwTxn};

use crate::LmdbError;

pub(crate) const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";
pub(crate) const NEXT_ESCROW_ID_KEY: &[u8] = b"next_escrow_id";

/// Read a little-endian `u64` stored under `key`.
pub(crate) fn read_u64(
    db: &Database<Bytes, Bytes>,
    txn: &RoTxn,
    key: &[u8],
) -> Result<Option<u64>, LmdbError> {
    match db.get(txn, key)? {
        Some(bytes) => {
            let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                LmdbError::Serialization(format!(
                    "meta key '{}' has unexpected byte length {}",
                    String::from_utf8_lossy(key),
                    bytes.len()
                ))
            })?;
            Ok(Some(u64::from_le_bytes(arr)))
        }
        None => Ok(None),
    }
}

pub(crate) fn write_u64(
    db: &Database<Bytes, Bytes>,
    txn: &mut RwTxn,
    key: &[u8],
    value: u64,
) -> Result<(), LmdbError> {
    db.put(txn, key, &value.to_le_bytes())?;
    Ok(())
}

/// Schema bookkeeping over the `meta` database.
#[derive(Clone)]
pub struct LmdbMetaStore {
    pub(crate) env: Arc<Env>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbMetaStore {
    /// Stored schema version; 0 for a fresh database.
    pub fn schema_version(&self) -> Result<u32, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let version = read_u64(&self.meta_db, &rtxn, SCHEMA_VERSION_KEY)?.unwrap_or(0);
        u32::try_from(version)
            .map_err(|_| LmdbError::Serialization(format!("schema version {version} out of range")))
    }

    pub fn set_schema_version(&self, version: u32) -> Result<(), LmdbError> {
        let mut wtxn = self.env.write_txn()?;
        write_u64(&self.meta_db, &mut wtxn, SCHEMA_VERSION_KEY, u64::from(version))?;
        wtxn.commit()?;
        Ok(())
    }

    /// The id the next escrow entry will receive.
    pub fn next_escrow_id(&self) -> Result<u64, LmdbError> {
        let rtxn = self.env.read_txn()?;
        Ok(read_u64(&self.meta_db, &rtxn, NEXT_ESCROW_ID_KEY)?.unwrap_or(0))
    }
}

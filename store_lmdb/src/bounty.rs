//! LMDB implementation of BountyStore.
//!
//! Key format: `bounty_id.to_be_bytes()`, so cursor order is id order.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use bounty_store::{BountyStore, StoreError};
use bounty_types::{Bounty, BountyId};

use crate::LmdbError;

#[derive(Clone)]
pub struct LmdbBountyStore {
    pub(crate) env: Arc<Env>,
    pub(crate) bounties_db: Database<Bytes, Bytes>,
}

impl BountyStore for LmdbBountyStore {
    fn put_bounty(&self, bounty: &Bounty) -> Result<(), StoreError> {
        let bytes = bincode::serialize(bounty).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.bounties_db
            .put(&mut wtxn, &bounty.id.to_be_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_bounty(&self, id: BountyId) -> Result<Bounty, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .bounties_db
            .get(&rtxn, &id.to_be_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("bounty {id}")))?;
        let bounty: Bounty = bincode::deserialize(val).map_err(LmdbError::from)?;
        Ok(bounty)
    }

    fn bounty_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self.bounties_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }

    fn iter_bounties(&self) -> Result<Vec<Bounty>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.bounties_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for result in iter {
            let (_key, val) = result.map_err(LmdbError::from)?;
            let bounty: Bounty = bincode::deserialize(val).map_err(LmdbError::from)?;
            results.push(bounty);
        }
        Ok(results)
    }
}

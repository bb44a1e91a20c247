//! Bounty storage trait.

use std::sync::Arc;

use crate::StoreError;
use bounty_types::{Bounty, BountyId};

/// Arena-style storage for bounty records.
///
/// Ids are insertion indices: the record for id `n` is only ever written after
/// ids `0..n` exist, so `bounty_count()` is also the next unused id. Records
/// are overwritten in place as their status and fulfilments change, and are
/// never deleted.
pub trait BountyStore {
    /// Insert or overwrite the record for `bounty.id`.
    fn put_bounty(&self, bounty: &Bounty) -> Result<(), StoreError>;

    /// Get a bounty by id. Returns `StoreError::NotFound` if absent.
    fn get_bounty(&self, id: BountyId) -> Result<Bounty, StoreError>;

    /// Number of stored bounties.
    fn bounty_count(&self) -> Result<u64, StoreError>;

    /// All bounties, in id order.
    fn iter_bounties(&self) -> Result<Vec<Bounty>, StoreError>;
}

impl<S: BountyStore + ?Sized> BountyStore for Arc<S> {
    fn put_bounty(&self, bounty: &Bounty) -> Result<(), StoreError> {
        (**self).put_bounty(bounty)
    }

    fn get_bounty(&self, id: BountyId) -> Result<Bounty, StoreError> {
        (**self).get_bounty(id)
    }

    fn bounty_count(&self) -> Result<u64, StoreError> {
        (**self).bounty_count()
    }

    fn iter_bounties(&self) -> Result<Vec<Bounty>, StoreError> {
        (**self).iter_bounties()
    }
}
